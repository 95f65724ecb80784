use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::info;

use crate::buffer::BufferUsage;
use crate::engine::{DashboardView, PageView};
use crate::rank::TopDomains;
use crate::stats::DeviceStat;

type Views = watch::Receiver<Arc<DashboardView>>;

/// Read-only routes over the latest published view.
pub fn router(views: Views) -> Router {
    Router::new()
        .route("/view", get(view))
        .route("/top", get(top))
        .route("/page", get(page))
        .route("/devices", get(devices))
        .route("/usage", get(usage))
        .with_state(views)
}

pub async fn serve(addr: SocketAddr, views: Views) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!(%addr, "serving dashboard view");
    axum::Server::bind(&addr)
        .serve(router(views).into_make_service())
        .await?;
    Ok(())
}

fn latest(views: &Views) -> Arc<DashboardView> {
    views.borrow().clone()
}

async fn view(State(views): State<Views>) -> Json<DashboardView> {
    Json(latest(&views).as_ref().clone())
}

async fn top(State(views): State<Views>) -> Json<TopDomains> {
    Json(latest(&views).top.clone())
}

async fn page(State(views): State<Views>) -> Json<PageView> {
    Json(latest(&views).page.clone())
}

async fn devices(State(views): State<Views>) -> Json<Value> {
    let view = latest(&views);
    let devices: Vec<Value> = view
        .stats
        .devices()
        .iter()
        .map(|device: &DeviceStat| {
            json!({
                "device": device,
                "color": view.device_colors.get(&device.ip),
            })
        })
        .collect();
    Json(Value::Array(devices))
}

async fn usage(State(views): State<Views>) -> Json<BufferUsage> {
    Json(latest(&views).usage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::DashboardEngine;
    use crate::models::dto::RecordDTO;

    fn views() -> (watch::Sender<Arc<DashboardView>>, Views) {
        let mut engine = DashboardEngine::default();
        engine.replace_all(vec![RecordDTO {
            domain: Some("a.com".into()),
            ip: Some("10.0.0.4".into()),
            time: Some("2024-03-01 12:00:00".into()),
            protocol: Some("UDP".into()),
            length: Some(json!(90)),
        }]);
        watch::channel(Arc::new(engine.view().clone()))
    }

    #[tokio::test]
    async fn handlers_read_latest_snapshot() {
        let (tx, rx) = views();
        let Json(ranked) = top(State(rx.clone())).await;
        assert_eq!(ranked.entries.len(), 1);

        tx.send_replace(Arc::new(DashboardEngine::default().view().clone()));
        let Json(current) = page(State(rx.clone())).await;
        assert!(current.rows.is_empty());
        let Json(report) = usage(State(rx)).await;
        assert_eq!(report.len, 0);
    }

    #[tokio::test]
    async fn devices_include_their_color() {
        let (_tx, rx) = views();
        let Json(listed) = devices(State(rx)).await;
        assert_eq!(listed[0]["device"]["ip"], "10.0.0.4");
        assert!(listed[0]["color"].as_str().unwrap().starts_with('#'));
    }
}
