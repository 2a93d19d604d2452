use crate::generator::profile::{build_scan, GeneratorConfig};
use crate::gui_bridge::model::VisualizationModel;
use crate::workflow::runner::{Runner, WorkflowResult};
use dosecore::scan_interface::RawSeries;
use serde_json::json;
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{Arc, RwLock},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

/// Largest request body accepted by the ingest routes.
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

type SharedModel = Arc<RwLock<VisualizationModel>>;

pub fn bind_address(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Hosts the report endpoint and analyses recordings posted to it.
pub struct GuiBridge {
    state: SharedModel,
    runner: Arc<Runner>,
}

impl GuiBridge {
    pub fn new(runner: Arc<Runner>) -> Self {
        Self {
            state: Arc::new(RwLock::new(VisualizationModel::default())),
            runner,
        }
    }

    pub fn routes(
        &self,
    ) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
        let state = self.state.clone();
        let state_filter = warp::any().map(move || state.clone());
        let runner = self.runner.clone();
        let runner_filter = warp::any().map(move || runner.clone());

        let report_route = warp::path("report")
            .and(warp::path::end())
            .and(warp::get())
            .and(state_filter.clone())
            .map(|state: SharedModel| {
                let model = match state.read() {
                    Ok(guard) => guard.clone(),
                    Err(_) => VisualizationModel::default(),
                };
                warp::reply::json(&model)
            });

        let ingest_route = warp::path("ingest")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::content_length_limit(MAX_BODY_BYTES))
            .and(warp::body::json())
            .and(state_filter.clone())
            .and(runner_filter)
            .and_then(ingest);

        let generator_route = warp::path("ingest-config")
            .and(warp::path::end())
            .and(warp::post())
            .and(warp::body::content_length_limit(MAX_BODY_BYTES))
            .and(warp::body::json())
            .and(state_filter)
            .and_then(ingest_config);

        report_route
            .or(ingest_route)
            .or(generator_route)
            .with(warp::log("analyzer::bridge"))
    }

    /// Serves the routes from a dedicated thread so the caller keeps its own runtime.
    pub fn serve(&self, addr: SocketAddr) {
        let routes = self.routes();
        thread::spawn(move || {
            match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime.block_on(warp::serve(routes).run(addr)),
                Err(err) => log::error!("failed to build bridge runtime: {err}"),
            }
        });
        log::info!("report bridge listening on http://{addr}");
    }

    pub fn publish(&self, model: &VisualizationModel) {
        store(&self.state, model.clone());
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> VisualizationModel {
        self.state.read().unwrap().clone()
    }
}

fn store(state: &SharedModel, model: VisualizationModel) {
    log::info!(
        "publishing {} shots, {} curves",
        model.shot_count,
        model.curves.len()
    );
    match state.write() {
        Ok(mut guard) => *guard = model,
        Err(_) => log::warn!("report state poisoned, update dropped"),
    }
}

fn analysis_failed(err: anyhow::Error) -> warp::reply::WithStatus<warp::reply::Json> {
    log::warn!("ingest failed: {err:#}");
    warp::reply::with_status(
        warp::reply::json(&json!({
            "status": "error",
            "message": format!("{err:#}"),
        })),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
}

fn analysis_ok(result: &WorkflowResult) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(
        warp::reply::json(&json!({
            "status": "ok",
            "shots": result.report.shots.segmented.shots.len(),
            "curves": result.report.shots.curves.len(),
        })),
        StatusCode::OK,
    )
}

async fn ingest(
    raw: RawSeries,
    state: SharedModel,
    runner: Arc<Runner>,
) -> Result<impl warp::Reply, Infallible> {
    Ok(match runner.execute(&raw) {
        Ok(result) => {
            store(&state, VisualizationModel::from_result(&result));
            analysis_ok(&result)
        }
        Err(err) => analysis_failed(err),
    })
}

/// Synthesizes a recording and analyses it with settings matched to the generator.
async fn ingest_config(
    config: GeneratorConfig,
    state: SharedModel,
) -> Result<impl warp::Reply, Infallible> {
    let runner = Runner::new(config.analysis_config());
    Ok(
        match build_scan(&config).and_then(|raw| runner.execute(&raw)) {
            Ok(result) => {
                if let Some(name) = config.scenario.as_ref() {
                    log::info!(
                        "scenario {} -> {} curves",
                        name,
                        result.report.shots.curves.len()
                    );
                }
                store(
                    &state,
                    VisualizationModel::from_result(&result).with_scenario(config.scenario),
                );
                analysis_ok(&result)
            }
            Err(err) => analysis_failed(err),
        },
    )
}
