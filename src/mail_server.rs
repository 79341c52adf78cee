use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use axum::http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use tokio::{net::TcpListener, sync::Notify};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
    config::{Config, ServerConfig},
    database::{MemoryUserRepository, UserRepository},
    error::{Error, StartupError, StdIoError},
    mail_manager::MailManager,
    routes::{router, AdminToken},
    smtp_manager::{Connector, LettreConnector},
};

pub struct Signals {
    pub stop: Arc<AtomicBool>,
    pub stop_notify: Arc<Notify>,
}

impl Signals {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.stop_notify.notify_waiters();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(origin) => Some(origin),
            Err(err) => {
                warn!("Ignoring allowed origin {}: {}", origin, err);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_origin(AllowOrigin::list(origins))
}

async fn serve<C: Connector + 'static>(
    listener: TcpListener,
    mail_server: Arc<MailServer<C>>,
    server_config: ServerConfig,
) {
    let app = router(
        mail_server.mail_manager.to_owned(),
        AdminToken::new(server_config.admin_token.as_deref()),
    )
    .layer(cors_layer(&server_config.allowed_origins))
    .layer(TraceLayer::new_for_http());

    // Registered before the flag check so a stop racing startup is not lost.
    let stopped = mail_server.signals.stop_notify.notified();
    tokio::pin!(stopped);
    stopped.as_mut().enable();
    if mail_server.signals.is_stopped() {
        return;
    }

    tokio::select! {
        result = async { axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await } => {
            if let Err(err) = result {
                error!("REST endpoint stopped: {}", err);
            }
        }
        _ = stopped => {
            info!("REST endpoint shutting down");
        },
    }
}

#[derive(Default)]
pub struct Builder {
    //required
    config: Option<Config>,

    //optional
    users: Option<Arc<dyn UserRepository>>,
    stop: Option<Arc<AtomicBool>>,
    stop_notify: Option<Arc<Notify>>,
}

impl Builder {
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    pub fn users(mut self, users: Arc<dyn UserRepository>) -> Self {
        self.users = Some(users);
        self
    }

    pub fn stop(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn stop_notify(mut self, stop_notify: Arc<Notify>) -> Self {
        self.stop_notify = Some(stop_notify);
        self
    }

    /// Binds `server.address` and serves in a spawned task until [`Signals::stop`].
    /// Without a configured user store the users come from `users.path`, or start empty.
    pub async fn start_server(self) -> Result<Arc<MailServer>, Error> {
        let config = match self.config {
            Some(config) => config,
            None => Config::load()?,
        };
        let users: Arc<dyn UserRepository> = match (self.users, config.users.path.as_ref()) {
            (Some(users), _) => users,
            (None, Some(path)) => Arc::new(MemoryUserRepository::from_file(path)?),
            (None, None) => Arc::new(MemoryUserRepository::new()),
        };
        let mail_manager = MailManager::from_config(&config, users)?;
        let signals = Signals {
            stop: self.stop.unwrap_or_default(),
            stop_notify: self.stop_notify.unwrap_or_default(),
        };

        let listener = TcpListener::bind(config.server.address)
            .await
            .map_err(|err| StartupError::Bind(StdIoError(err)))?;
        let address = listener
            .local_addr()
            .map_err(|err| StartupError::Bind(StdIoError(err)))?;
        info!("REST endpoint listening on {}", address);
        if config.server.admin_token.is_none() {
            warn!("No server.admin_token configured, invites over HTTP are disabled");
        }

        let mail_server: Arc<MailServer> = Arc::new(MailServer {
            mail_manager: Arc::new(mail_manager),
            signals,
            address,
        });

        let mail_server_ = mail_server.to_owned();
        let server_config = config.server;
        tokio::spawn(async move { serve(listener, mail_server_, server_config).await });

        Ok(mail_server)
    }
}

pub struct MailServer<C: Connector = LettreConnector> {
    pub mail_manager: Arc<MailManager<C>>,
    pub signals: Signals,
    address: SocketAddr,
}

impl MailServer {
    pub fn builder() -> Builder {
        Builder::default()
    }
}

impl<C: Connector> MailServer<C> {
    /// Address actually bound, so port 0 resolves to the assigned port.
    pub fn get_address(&self) -> SocketAddr {
        self.address
    }
}
