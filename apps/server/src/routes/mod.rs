use actix_web::web::ServiceConfig;

mod health;
mod invoke;

pub fn routes(cfg: &mut ServiceConfig) {
    cfg.service(health::health_route).service(invoke::invoke_route);
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use actix_web::web;
    use skyprobe::reporter::{MemorySink, SlackNotifier};
    use skyprobe::{ProberKind, Reporter};

    use crate::WorkerState;

    pub fn state() -> web::Data<WorkerState> {
        let reporter = Reporter::new(Arc::new(SlackNotifier::new().unwrap()), Arc::new(MemorySink::new()));
        web::Data::new(WorkerState { region: "us-east-1".to_string(), prober: ProberKind::Tracer, reporter })
    }
}
