use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use lloggs::LoggingArgs;
use tracing::{info, warn};

use pti_server::config::{
    Config, DEFAULT_HEXCODE_ATTEMPTS, DEFAULT_MAX_UPLOAD_SIZE, NamingStrategy,
};
use pti_server::{ImageDb, api, audit, storage::FsStorage};

#[derive(Parser)]
#[command(name = "pti-server")]
#[command(about = "PTI image hosting server")]
struct Args {
    /// Address to listen on
    #[arg(long, short, default_value = "127.0.0.1:29911")]
    listen: SocketAddr,

    /// Directory uploaded images are stored in
    #[arg(long, short, default_value = "Uploaded_Data")]
    upload_dir: PathBuf,

    /// SQLite database path [default: <upload dir>/../pti.db]
    #[arg(long, short)]
    database: Option<PathBuf>,

    /// Base URL used in returned image links [default: http://<listen>]
    #[arg(long)]
    public_url: Option<String>,

    /// Content type accepted for upload (repeatable)
    #[arg(
        long = "allow-type",
        value_name = "MIME",
        default_values_t = pti::DEFAULT_ALLOWED_CONTENT_TYPES.iter().map(|s| s.to_string()).collect::<Vec<_>>()
    )]
    allowed_types: Vec<String>,

    /// Largest accepted upload in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_SIZE)]
    max_upload_size: usize,

    /// How stored filenames are chosen
    #[arg(long, value_enum, default_value_t = NamingStrategy::Original)]
    naming: NamingStrategy,

    /// Hexcodes to try per upload before reporting a collision
    #[arg(long, default_value_t = DEFAULT_HEXCODE_ATTEMPTS)]
    hexcode_attempts: u32,

    /// Report records without files and files without records, then exit
    #[arg(long)]
    audit: bool,

    #[command(flatten)]
    logging: LoggingArgs,
}

impl Args {
    fn into_config(self) -> Config {
        let database_path = self.database.unwrap_or_else(|| {
            self.upload_dir
                .parent()
                .unwrap_or(&self.upload_dir)
                .join("pti.db")
        });

        Config {
            public_url: self
                .public_url
                .unwrap_or_else(|| format!("http://{}", self.listen)),
            listen_addr: self.listen,
            upload_dir: self.upload_dir,
            database_path,
            allowed_content_types: self
                .allowed_types
                .into_iter()
                .map(|t| t.trim().to_ascii_lowercase())
                .collect(),
            max_upload_size: self.max_upload_size,
            naming: self.naming,
            hexcode_attempts: self.hexcode_attempts,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();
    let _guard = args.logging.setup(|v| match v {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    })?;

    let run_audit = args.audit;
    let config = args.into_config();

    info!(
        listen = %config.listen_addr,
        upload_dir = ?config.upload_dir,
        naming = %config.naming,
        "Starting server"
    );

    // Initialize storage
    let storage = FsStorage::new(&config.upload_dir);
    storage.init().await?;

    // Initialize image record database
    let db = ImageDb::open(&config.database_path)?;
    info!(db_path = ?config.database_path, "Initialized image database");

    if run_audit {
        let report = audit::audit(&db, &storage).await?;
        println!(
            "{} records, {} files, {} records without file, {} files without record",
            report.records,
            report.files,
            report.orphan_records.len(),
            report.orphan_files.len()
        );
        if !report.is_consistent() {
            warn!("Record store and upload directory disagree");
        }
        return Ok(());
    }

    // Build router
    let listen_addr = config.listen_addr;
    let app = api::router(storage, db, config);

    // Start server
    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("Listening on {}", listen_addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
