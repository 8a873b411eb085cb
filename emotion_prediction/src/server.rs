use crate::{
    config::Config,
    inference_service::InferenceService,
    model_service::ModelService,
    ort_service::OrtModelService,
    state::{ServiceState, State},
};
use emotion_proto::emotion_service_server::EmotionServiceServer;
use tokio::signal;
use tonic::transport::server::Router;
use tonic::transport::Server;
use tonic_health::ServingStatus;

const SERVICE_NAME: &str = "emotion.EmotionService";

pub struct GrpcServer {
    router: Router,
    health_reporter: tonic_health::server::HealthReporter,
    addr: String,
}

impl GrpcServer {
    pub fn new(
        model_service: impl ModelService,
        service_state: impl State,
        addr: &str,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let inference_service = InferenceService::new(model_service, service_state);
        let reflection_service = tonic_reflection::server::Builder::configure()
            .register_encoded_file_descriptor_set(emotion_proto::FILE_DESCRIPTOR_SET)
            .build_v1alpha()?;
        let (health_reporter, health_service) = tonic_health::server::health_reporter();

        let router = Server::builder()
            .add_service(health_service)
            .add_service(EmotionServiceServer::new(inference_service))
            .add_service(reflection_service);

        Ok(Self {
            router,
            health_reporter,
            addr: addr.to_string(),
        })
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let addr: std::net::SocketAddr = self.addr.parse()?;

        self.health_reporter
            .set_service_status(SERVICE_NAME, ServingStatus::Serving)
            .await;
        tracing::info!("Emotion service listening on {}", self.addr);

        let health_reporter = self.health_reporter.clone();
        let shutdown = async move {
            shutdown_signal().await;
            health_reporter
                .set_service_status(SERVICE_NAME, ServingStatus::NotServing)
                .await;
            tracing::info!("Shutdown signal received, starting graceful shutdown")
        };

        self.router.serve_with_shutdown(addr, shutdown).await?;
        Ok(())
    }
}

pub async fn start_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let ort_model_service = OrtModelService::new(&config.model)?;
    let service_state = ServiceState::new(&config.labels)?;

    let addr = config.server.get_address();
    let grpc_server = GrpcServer::new(ort_model_service, service_state, &addr)?;

    grpc_server.run().await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
