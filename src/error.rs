use thiserror::Error;

/// エクスポート処理のエラー
///
/// 表示文字列はHTTPレスポンスの `error`/`detail` にそのまま載るため英語で統一する。
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("browser initialization failed: {0}")]
    BrowserInit(String),

    #[error("login rejected: {0}")]
    Auth(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("navigation timed out: {0}")]
    NavigationTimeout(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("page script failed: {0}")]
    JavaScript(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("file system error: {0}")]
    FileSystem(#[from] std::io::Error),

    #[error("export worker failed: {0}")]
    Worker(String),
}

impl ExportError {
    /// クライアント向けの安定したエラー種別
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::BrowserInit(_) => "BROWSER_INIT",
            ExportError::Auth(_) => "AUTH_FAILED",
            ExportError::Navigation(_) => "NAVIGATION_FAILED",
            ExportError::NavigationTimeout(_) => "NAVIGATION_TIMEOUT",
            ExportError::ElementNotFound(_) => "ELEMENT_NOT_FOUND",
            ExportError::JavaScript(_) => "SCRIPT_FAILED",
            ExportError::Download(_) => "DOWNLOAD_FAILED",
            ExportError::FileSystem(_) => "FILE_SYSTEM",
            ExportError::Worker(_) => "INTERNAL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_distinguishes_login_from_download() {
        let login = ExportError::Auth("still on login page".into());
        let download = ExportError::Download("no download was triggered".into());

        assert_eq!(login.kind(), "AUTH_FAILED");
        assert_eq!(download.kind(), "DOWNLOAD_FAILED");
        assert_eq!(login.to_string(), "login rejected: still on login page");
    }

    #[test]
    fn test_io_error_converts_to_file_system() {
        let err: ExportError =
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied").into();
        assert_eq!(err.kind(), "FILE_SYSTEM");
    }
}
