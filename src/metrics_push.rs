use tracing::{info, warn};

/// Push the rendered metrics snapshot to a Pushgateway.
///
/// Env:
/// - PUSHGATEWAY_URL: base URL (e.g. http://localhost:9091). Unset means no push.
///
/// Failures are logged and swallowed; metrics never fail a pipeline run.
pub async fn push_metrics(instance: &str) {
    let base = match std::env::var("PUSHGATEWAY_URL") {
        Ok(v) if !v.trim().is_empty() => v,
        _ => return,
    };

    let body = match crate::metrics::render() {
        Some(text) if !text.is_empty() => text,
        _ => {
            info!("pushgateway: no metrics recorded, skipping push");
            return;
        }
    };

    let push_url = push_url(&base, instance);
    let client = reqwest::Client::new();
    let result = client
        .post(&push_url)
        .header("Content-Type", "text/plain; version=0.0.4")
        .body(body)
        .send()
        .await;

    match result {
        Ok(r) if r.status().is_success() => {
            info!("Pushed metrics to Pushgateway for instance={}", instance);
        }
        Ok(r) => {
            warn!("Pushgateway responded with status {} for instance={}", r.status().as_u16(), instance);
        }
        Err(e) => {
            warn!("Failed to push metrics to Pushgateway for instance={}: {}", instance, e);
        }
    }
}

fn push_url(base: &str, instance: &str) -> String {
    format!(
        "{}/metrics/job/permit_pipeline/instance/{}",
        base.trim_end_matches('/'),
        instance
    )
}
