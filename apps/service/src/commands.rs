//! Subcommand implementations.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use skyprobe::reporter::{LogSink, SlackNotifier};
use skyprobe::{
    Coordinator, DispatchPlan, DispatchSettings, HttpInvoker, Invoker, LocalInvoker, PassReport,
    ProbeContext, Reporter, Resolver, Target, worker,
};
use tracing::{info, warn};

use crate::cli::{PassArgs, PlanArgs, ShootArgs};
use crate::config::Config;
use crate::template::load_template;

fn reporter() -> Result<Reporter> {
    let notifier = SlackNotifier::new().context("failed to build webhook client")?;
    Ok(Reporter::new(Arc::new(notifier), Arc::new(LogSink)))
}

/// Load and resolve a template into a dispatch plan
pub fn plan(config: &Config, args: &PlanArgs) -> Result<DispatchPlan> {
    let template = load_template(&args.template)?;
    let level = (config.log_level == "debug").then(|| config.log_level.clone());

    Resolver::new()
        .all_regions(args.all_regions)
        .default_region(config.default_region.clone())
        .log_level(level)
        .resolve(&template)
        .with_context(|| format!("template {} rejected", args.template.display()))
}

fn coordinator(config: &Config, plan: &DispatchPlan, local: bool) -> Result<Coordinator> {
    let invoker: Arc<dyn Invoker> = if local {
        Arc::new(LocalInvoker::new(config.prober, reporter()?))
    } else {
        let invoker = HttpInvoker::new(config.workers.clone(), Duration::from_secs(config.request_timeout_secs))
            .context("failed to build worker client")?;
        invoker.check_coverage(plan)?;
        Arc::new(invoker)
    };

    Ok(Coordinator::new(invoker, DispatchSettings { concurrency: config.concurrency }))
}

fn finish(report: &PassReport) -> Result<()> {
    report.log_summary();
    if !report.is_success() {
        bail!("{} of {} jobs failed", report.failure_count(), report.outcomes.len());
    }
    Ok(())
}

pub async fn run(config: &Config, args: &PassArgs) -> Result<()> {
    let plan = plan(config, &args.plan)?;
    let report = coordinator(config, &plan, args.local)?.run_pass(&plan).await;
    print!("{report}");
    finish(&report)
}

pub async fn watch(config: &Config, args: &PassArgs, passes: Option<usize>) -> Result<()> {
    let plan = plan(config, &args.plan)?;
    let coordinator = coordinator(config, &plan, args.local)?;
    let mut ticker = tokio::time::interval(plan.total_interval);
    let mut completed = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted after {completed} passes");
                return Ok(());
            }
        }

        let report = coordinator.run_pass(&plan).await;
        if let Err(e) = finish(&report) {
            warn!("{e}");
        }

        completed += 1;
        if passes.is_some_and(|limit| completed >= limit) {
            return Ok(());
        }
    }
}

pub async fn shoot(config: &Config, args: &ShootArgs) -> Result<()> {
    let mut target = Target::new(args.url.clone(), args.method);
    target.port = args.port.clone();
    target.timeout = args.timeout;
    target.body = args.body_map();
    target.header = args.header_map();

    let context = ProbeContext::new(config.default_region.clone(), reporter()?);
    let result = worker::shoot(&target, context).await.with_context(|| format!("probe of {} failed", args.url))?;

    print!("{result}");
    Ok(())
}

pub fn validate(config: &Config, args: &PlanArgs) -> Result<()> {
    let plan = plan(config, args)?;
    let pacing = skyprobe::dispatch::pacing_interval(plan.total_interval, plan.batches.len());

    print!("{plan}");
    println!("Pacing: {}s between regions", pacing.interval.as_secs());
    if pacing.degenerate {
        println!("Warning: the interval is too short for {} regions", plan.batches.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn write_template(dir: &tempfile::TempDir, body: &str) -> PlanArgs {
        let path = dir.path().join("health.toml");
        fs::write(&path, body).unwrap();
        PlanArgs { template: path, all_regions: false }
    }

    #[test]
    fn test_plan_uses_configured_default_region() {
        let dir = tempfile::tempdir().unwrap();
        let args = write_template(
            &dir,
            "name = \"health\"\n[[targets]]\nurl = \"https://example.com\"\nmethod = \"GET\"\n",
        );
        let config = Config { default_region: "ap-south-1".into(), ..Config::default() };

        let plan = plan(&config, &args).unwrap();
        assert_eq!(plan.region_ids(), vec!["ap-south-1"]);
    }

    #[test]
    fn test_remote_dispatch_needs_every_worker() {
        let dir = tempfile::tempdir().unwrap();
        let args = write_template(
            &dir,
            "name = \"health\"\n[[targets]]\nurl = \"https://example.com\"\nmethod = \"GET\"\n",
        );
        let config = Config::default();
        let plan = plan(&config, &args).unwrap();

        assert!(coordinator(&config, &plan, false).is_err());
        assert!(coordinator(&config, &plan, true).is_ok());
    }

    #[tokio::test]
    async fn test_run_dispatches_to_workers() {
        let worker = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/invoke"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})))
            .expect(2)
            .mount(&worker)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let args = write_template(
            &dir,
            "name = \"health\"\ninterval = 2\n\
             [[targets]]\nurl = \"https://example.com\"\nmethod = \"GET\"\n\
             [[regions]]\nregion = \"us-east-1\"\n[[regions]]\nregion = \"eu-west-1\"\n",
        );
        let mut config = Config::default();
        config.workers.insert("us-east-1".into(), worker.uri());
        config.workers.insert("eu-west-1".into(), worker.uri());

        run(&config, &PassArgs { plan: args, local: false }).await.unwrap();
    }
}
