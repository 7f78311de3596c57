use dhd_export_service::{DhdExporter, ExporterConfig, Scraper};
use std::path::PathBuf;
use uuid::Uuid;

#[tokio::main]
async fn main() {
    // ログ設定
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    // 環境変数から認証情報を取得
    let email = std::env::var("DHD_EMAIL").expect("DHD_EMAIL environment variable not set");
    let password =
        std::env::var("DHD_PASSWORD").expect("DHD_PASSWORD environment variable not set");

    let config = ExporterConfig::new(&email, &password)
        .with_download_path(PathBuf::from("./downloads"))
        .with_headless(false) // デバッグ用に表示モード
        .with_debug(true);

    let mut exporter = DhdExporter::new(Uuid::new_v4(), config);

    println!("=== DHD Export Test ({}) ===", exporter.job_id());

    match exporter.execute().await {
        Ok(path) => {
            println!("成功! 保存先: {:?}", path);
        }
        Err(e) => {
            eprintln!("エラー [{}]: {}", e.kind(), e);
        }
    }
}
