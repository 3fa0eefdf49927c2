//! Worker entry points: run one invocation payload, or verify one target.

use tracing::info;

use crate::error::ProbeError;
use crate::prober::{ProbeContext, Prober, ProberKind};
use crate::schema::{Invocation, ProbeResult, Target};
use crate::tracer::Tracer;

/// Configure a prober of `kind` from the payload and run it once
pub async fn execute(
    kind: ProberKind,
    context: ProbeContext,
    invocation: &Invocation,
) -> Result<(), ProbeError> {
    invocation.validate()?;

    let mut prober = kind.build(context);
    prober.set_target(&invocation.target, &invocation.port)?;
    prober.set_method(invocation.method)?;
    if let Some(body) = &invocation.body {
        prober.set_body(body.clone())?;
    }
    if let Some(header) = &invocation.header {
        prober.set_header(header.clone())?;
    }
    prober.set_rate(1);
    prober.set_timeout(invocation.timeout);
    prober.set_slack_urls(invocation.slack_urls.clone());
    prober.set_log_level(invocation.log_level.clone());

    prober.run().await
}

/// Trace a single target in-process and return the result
pub async fn shoot(target: &Target, context: ProbeContext) -> Result<ProbeResult, ProbeError> {
    info!("verifying {} {}", target.method, target.url);

    let mut tracer = Tracer::new(context);
    tracer.set_target(&target.url, target.port.as_deref().unwrap_or_default())?;
    tracer.set_method(target.method)?;
    if let Some(body) = &target.body {
        tracer.set_body(body.clone())?;
    }
    if let Some(header) = &target.header {
        tracer.set_header(header.clone())?;
    }
    tracer.set_timeout(target.timeout.unwrap_or_default());

    tracer.run_with_result().await
}
