//! Unitypack - Package Unity assets and release artefacts.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use unitypack_common::Timestamp;
use unitypack_packager::ignore::UNITY_PACKAGE_IGNORES;
use unitypack_packager::publish::{self, DEFAULT_ACL, DEFAULT_BUCKET, DEFAULT_PREFIX};
use unitypack_packager::{PackageConfig, PublishConfig, UploadKind, ZipConfig};

#[derive(Parser)]
#[command(name = "unitypack")]
#[command(
    author,
    version,
    about = "Build .unitypackage files, release zips and upload plans"
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a .unitypackage from a Unity asset tree
    Package {
        /// Path to the source assets to be packaged
        #[arg(long)]
        path: PathBuf,

        /// Filename of the unitypackage, without extension
        #[arg(long)]
        file: String,

        /// Where to save the package and md5 files
        #[arg(long, short)]
        out: PathBuf,

        /// Extra ignore rule, applied after the defaults (repeatable)
        #[arg(long = "ignore")]
        ignores: Vec<String>,

        /// Replace the default ignore rules instead of extending them
        #[arg(long)]
        no_default_ignores: bool,

        /// Modification time for archive entries (RFC 3339)
        #[arg(long)]
        mtime: Option<String>,
    },

    /// Zip a whole directory, e.g. octorun, and write its md5
    Zip {
        /// Path to the directory to zip
        #[arg(long)]
        path: PathBuf,

        /// Where to save the zip and md5 files
        #[arg(long, short)]
        out: PathBuf,

        /// Archive name, without extension
        #[arg(long, default_value = "octorun")]
        name: String,

        /// Folder inside the archive holding the entries (defaults to the name)
        #[arg(long)]
        base: Option<String>,

        /// Entry date (RFC 3339); defaults to the last git commit date
        #[arg(long)]
        date: Option<String>,
    },

    /// Show what would be uploaded for a release, without uploading
    PublishPlan {
        /// What to publish (feed, git, package)
        #[arg(long)]
        kind: String,

        /// Path to the files to be uploaded
        #[arg(long, short)]
        path: PathBuf,

        /// Target bucket
        #[arg(long, default_value = DEFAULT_BUCKET)]
        bucket: String,

        /// Root key prefix
        #[arg(long, default_value = DEFAULT_PREFIX)]
        prefix: String,

        /// Canned ACL for uploaded objects
        #[arg(long, default_value = DEFAULT_ACL)]
        acl: String,

        /// Write the plan as JSON to this file
        #[arg(long)]
        plan_out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    match cli.command {
        Commands::Package {
            path,
            file,
            out,
            ignores,
            no_default_ignores,
            mtime,
        } => {
            let mut config = PackageConfig::new(path, out, file);
            if no_default_ignores {
                config.ignore_rules.clear();
            }
            config.ignore_rules.extend(ignores);
            if let Some(mtime) = mtime {
                config.mtime = mtime.parse::<Timestamp>()?;
            }
            if !no_default_ignores {
                info!("Using default ignore rules: {}", UNITY_PACKAGE_IGNORES.join(" "));
            }

            let report = unitypack_packager::build_unity_package(&config).await?;
            println!("{}", report.checksum);
        }

        Commands::Zip {
            path,
            out,
            name,
            base,
            date,
        } => {
            let mut config = ZipConfig::new(path, out);
            config.name = name;
            config.base = base;
            config.date = date.map(|d| d.parse::<Timestamp>()).transpose()?;

            let report = unitypack_packager::build_directory_zip(&config)?;
            println!("{}", report.checksum);
        }

        Commands::PublishPlan {
            kind,
            path,
            bucket,
            prefix,
            acl,
            plan_out,
        } => {
            let kind: UploadKind = kind.parse()?;
            let mut config = PublishConfig::new(kind, path);
            config.bucket = bucket;
            config.prefix = prefix;
            config.acl = acl;

            let plan = unitypack_packager::plan_publish(&config)?;
            info!("{} objects for s3://{}", plan.items.len(), plan.bucket);

            if let Some(plan_out) = plan_out {
                publish::write_plan(&plan, &plan_out)?;
                info!("Plan written to {:?}", plan_out);
            }
        }
    }

    Ok(())
}
