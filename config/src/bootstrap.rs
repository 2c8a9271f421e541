use std::env;
use log::{ info, warn, error };
use std::fs::read_to_string;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::{
    select,
    sync::mpsc,
    sync::oneshot,
    sync::RwLock,
    signal
};
use domains::Event;
use handlers::todo::Coordinator;
use handlers::publish::PublishStats;
use queue::publisher::Publisher;
use repos::item::Repo as ItemRepo;
use repos::event_log::Repo as EventLog;
use crate::tables::{
    Config,
    Queue
};


/// Something stopped the service from starting.
#[derive(Debug, Error)]
pub enum StartupError {

    /// The config file could not be parsed
    #[error("the config file {0} is invalid: {1}")]
    Config(String, String),

    /// A store or queue could not be opened
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// The API could not bind to its address
    #[error("the API failed to start: {0}")]
    Api(#[from] warp::Error),

}


/// Starts the message bus and the API with the settings found in the
/// config file and returns the handles needed to run and stop them.
pub async fn init(config_filepath: String, use_logging: bool) -> Result<(
    oneshot::Sender<()>,
    tokio::task::JoinHandle<()>,
    mpsc::UnboundedSender<Event>,
    tokio::task::JoinHandle<()>
), StartupError> {

    // Setup and start the logger. This is configured based
    // on RUST_LOG env var.
    if use_logging {

        if env::var_os("RUST_LOG").is_none() {
            env::set_var("RUST_LOG", "info");
        }

        pretty_env_logger::init();

    }

    info!(target: "bootstrap", "Starting the to-do service ...");

    // Try to read the config file.
    let config = get_config(config_filepath)?;

    // open the stores, enabling shared ownership across threads
    let items = Arc::new(RwLock::new(ItemRepo::new(Some(config.store.items_dirpath()))?));
    let event_log = Arc::new(RwLock::new(EventLog::new(Some(config.store.event_log_filepath()))?));

    if !config.store.event_log {
        info!(target: "bootstrap", "The event log is turned off, events will only be published.");
    }

    // start the message bus in front of the queue
    let stats = Arc::new(PublishStats::default());
    let publisher = get_publisher(&config)?;

    let (bus_tx, bus_handle) = bus::start(
        publisher,
        config.publish.retry_policy(),
        stats.clone()
    ).await;

    let coordinator = Coordinator::new(
        items,
        event_log,
        bus_tx.clone(),
        config.store.event_log,
        config.publish.mode
    );

    // then start the entrypoints API
    let (api_tx, api_handle) = match entrypoints::start(
        coordinator,
        stats,
        config.api.max_request_size,
        config.api.ip,
        config.api.port
    ).await {

        Ok(api) => api,
        Err(e) => {

            // don't leave the bus running without an API
            let _ = bus_tx.send(Event::Shutdown);
            return Err(e.into());

        }

    };

    Ok((api_tx, api_handle, bus_tx, bus_handle))

}


/// Looks for the config file. If it can't find it, start the service with
/// default values. A file that exists but can't be parsed stops the start.
fn get_config(filepath: String) -> Result<Config, StartupError> {

    match read_to_string(&filepath) {

        Ok(content) => match toml::from_str(&content) {

            Ok(config) => {

                info!(target: "bootstrap", "Starting with configurations from {}.", &filepath);
                Ok(config)

            },
            Err(error) => {

                error!(target: "bootstrap", "Got error while trying to parse {}", &filepath);
                error!(target: "bootstrap", "{}", error.to_string());
                Err(StartupError::Config(filepath, error.to_string()))

            }

        },
        Err(error) => {

            match error.kind() {
                ErrorKind::PermissionDenied => warn!(target: "bootstrap", "The service does not have permission to access {}.", &filepath),
                ErrorKind::NotFound => warn!(target: "bootstrap", "Could not find the file {}.", &filepath),
                _ => warn!(target: "bootstrap", "Unknown error while trying to read {}.", &filepath),
            }

            info!(target: "bootstrap", "Reverting to the default configuration");
            Ok(Config::default())

        }

    }

}


/// Create the queue publisher named in the config, if there is one
fn get_publisher(config: &Config) -> Result<Option<Arc<dyn Publisher>>, StartupError> {

    let publisher: Arc<dyn Publisher> = match &config.queue {

        None => return Ok(None),

        Some(Queue::Http(queue)) => {

            info!(target: "bootstrap", "HTTP queue found in config posting events to {} on {}.", &queue.queue_name, &queue.connection_target);
            Arc::new(queue::http::HttpQueue::new(
                &queue.connection_target,
                &queue.queue_name,
                queue.token.clone(),
                Duration::from_millis(queue.timeout_ms)
            )?)

        },

        Some(Queue::Localfile(queue)) => {

            info!(target: "bootstrap", "Localfile queue found in config writing events to {}.", &queue.dirpath.display());
            Arc::new(queue::localfile::Localfile::new(&queue.dirpath, &queue.queue_name)?)

        },

    };

    Ok(Some(publisher))

}


/// Uses the handlers to continuously check that the service is running.
/// Will shut the service down if one of the handlers drops.
pub async fn run(
    api_tx: oneshot::Sender<()>,
    mut api_handle: tokio::task::JoinHandle<()>,
    bus_tx: mpsc::UnboundedSender<Event>,
    mut bus_handle: tokio::task::JoinHandle<()>
) {

    info!(target: "bootstrap", "The to-do service started");

    select! {

        _ = &mut api_handle => {

            warn!(target: "bootstrap", "The API has failed. Starting shutdown process.");

            // initiate the bus shutdown and let it finish what is queued
            let _ = bus_tx.send(Event::Shutdown);
            let _ = bus_handle.await;

        }

        _ = &mut bus_handle => {

            warn!(target: "bootstrap", "The message bus has failed. Starting shutdown process.");

            // initiate the api shutdown
            let _ = api_tx.send(());
            let _ = api_handle.await;

        }

        // listen for a ctrl-c keystroke i.e. the user wants
        // the service to shutdown
        _ = signal::ctrl_c() => {

            warn!(target: "bootstrap", "Shutdown request received. Starting shutdown process.");

            // stop accepting requests first so no new events are made
            let _ = api_tx.send(());
            let _ = api_handle.await;

            // then let the bus publish everything still queued
            let _ = bus_tx.send(Event::Shutdown);
            let _ = bus_handle.await;

        }
    };

    info!(target: "bootstrap", "The to-do service has successfully shutdown.");

}
