//! cdsbrowse - parcourt le ContentDirectory depuis la ligne de commande.
//!
//! Monte la bibliothèque configurée (ou `--library`) et exécute les actions
//! ContentDirectory localement, sans couche HTTP.
//!
//! ```text
//! cdsbrowse --library ~/Music tree --depth 3
//! cdsbrowse --library ~/Music browse 0
//! cdsbrowse browse 4 --metadata
//! cdsbrowse features
//! ```

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use cdsconfig::Config;
use cdsdidl::DIDLLite;
use cdsmediaserver::{
    BrowseFlag, ContentDirectory, ContentDirectorySettings, ROOT_ID, RequestInfo,
    ResourceHandler, Transport,
};
use cdssource::FolderSource;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(name = "cdsbrowse", version, about = "Browse a UPnP ContentDirectory tree locally")]
struct Cli {
    /// Répertoire de configuration (défaut : $CDS_CONFIG, ./.cdsmedia, ~/.cdsmedia)
    #[arg(long)]
    config: Option<String>,

    /// Dossier de médias à monter, prioritaire sur `library.directory`
    #[arg(long)]
    library: Option<PathBuf>,

    /// Point de montage de la bibliothèque
    #[arg(long)]
    mount: Option<String>,

    /// Logs de debug
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Action Browse sur un ObjectID, affiche le DIDL-Lite
    Browse {
        object_id: String,
        /// BrowseMetadata au lieu de BrowseDirectChildren
        #[arg(long)]
        metadata: bool,
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// 0 = tous les enfants
        #[arg(long, default_value_t = 0)]
        count: usize,
    },
    /// Affiche l'arborescence à partir de la racine
    Tree {
        #[arg(long, default_value_t = 2)]
        depth: usize,
    },
    /// Document X_GetFeatureList
    Features,
    /// Description SCPD du service
    Scpd,
    /// protocolInfo annoncés (Source du ConnectionManager)
    Protocols,
}

/// Transport local : pas de serveur HTTP, pas d'abonnés
struct LocalTransport;

impl Transport for LocalTransport {
    fn register_resource_handler(&self, prefix: &str, _handler: Arc<dyn ResourceHandler>) {
        debug!(prefix = %prefix, "Resource handler registered");
    }

    fn unregister_resource_handler(&self, prefix: &str) {
        debug!(prefix = %prefix, "Resource handler unregistered");
    }

    fn post_event(&self, service_id: &str) {
        debug!(service = %service_id, "📡 Event posted");
    }

    fn current_subscriber_count(&self) -> usize {
        0
    }
}

fn load_config(directory: Option<&str>) -> Arc<Config> {
    match directory {
        Some(dir) => match Config::load_config(dir) {
            Ok(config) => Arc::new(config),
            Err(e) => {
                eprintln!("Cannot load configuration from {dir}: {e:#}, using embedded defaults");
                Arc::new(Config::embedded())
            }
        },
        None => cdsconfig::get_config(),
    }
}

async fn mount_library(cd: &ContentDirectory, cli: &Cli, config: &Config) -> Result<()> {
    let configured = config.get_library()?;

    let (name, directory, mount) = match (&cli.library, configured) {
        (Some(dir), configured) => {
            let mount = cli
                .mount
                .clone()
                .or_else(|| configured.map(|l| l.mount))
                .unwrap_or_else(|| "/Library/".to_string());
            ("library".to_string(), dir.clone(), mount)
        }
        (None, Some(library)) => {
            let mount = cli.mount.clone().unwrap_or(library.mount);
            (library.name, PathBuf::from(library.directory), mount)
        }
        (None, None) => {
            warn!("No library configured, the tree will be empty");
            return Ok(());
        }
    };

    if !directory.is_dir() {
        anyhow::bail!("{} is not a directory", directory.display());
    }

    let source = FolderSource::new(name, directory.clone(), mount.as_str());
    let prefix = cd.register_source(&mount, Arc::new(source)).await;
    info!(directory = %directory.display(), prefix = %prefix, "📚 Library mounted");
    Ok(())
}

async fn print_tree(cd: &ContentDirectory, request: &RequestInfo, max_depth: usize) -> Result<()> {
    let root_title = cd.handler().settings().root_title.clone();
    // (id, titre, profondeur, conteneur ?)
    let mut stack = vec![(ROOT_ID.to_string(), root_title, 0usize, true)];

    while let Some((id, title, depth, is_container)) = stack.pop() {
        if !is_container {
            println!("{}{}  [{}]", "  ".repeat(depth), title, id);
            continue;
        }
        println!("{}{}/  [{}]", "  ".repeat(depth), title, id);
        if depth >= max_depth {
            continue;
        }

        let page = cd
            .browse(&id, BrowseFlag::DirectChildren, 0, 0, request)
            .await
            .with_context(|| format!("Browse of {id} failed"))?;
        let didl = DIDLLite::parse(&page.result)?;

        // ordre du document conservé à l'affichage
        for object in didl.objects.iter().rev() {
            stack.push((
                object.id().to_string(),
                object.title().to_string(),
                depth + 1,
                object.is_container(),
            ));
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref());
    logging::init_logging(&config, cli.verbose);

    let settings = ContentDirectorySettings::from_config(&config);
    let cd = ContentDirectory::new(settings, Arc::new(LocalTransport));
    mount_library(&cd, &cli, &config).await?;
    cd.initialize();

    let request = RequestInfo::new(
        concat!("cdsbrowse/", env!("CARGO_PKG_VERSION")),
        "127.0.0.1",
        "",
    );

    match &cli.command {
        Command::Browse {
            object_id,
            metadata,
            start,
            count,
        } => {
            let flag = if *metadata {
                BrowseFlag::Metadata
            } else {
                BrowseFlag::DirectChildren
            };
            let page = cd.browse(object_id, flag, *start, *count, &request).await?;
            eprintln!(
                "NumberReturned={} TotalMatches={} UpdateID={}",
                page.number_returned, page.total_matches, page.update_id
            );
            println!("{}", page.result);
        }
        Command::Tree { depth } => print_tree(&cd, &request, *depth).await?,
        Command::Features => println!("{}", cd.x_get_feature_list()?),
        Command::Scpd => println!("{}", cd.scpd_xml()?),
        Command::Protocols => {
            for info in cd.source_protocol_info().split(',') {
                println!("{info}");
            }
        }
    }

    cd.close();
    Ok(())
}
