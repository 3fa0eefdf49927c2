//! Trigger/target resolution.
//!
//! Turns a [`Template`] into a [`DispatchPlan`]: the ordered region batches
//! and the jobs each region is eligible to run. Every configuration problem
//! is reported here, before anything is dispatched.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use tracing::debug;

use crate::DEFAULT_REGION;
use crate::error::ProbeError;
use crate::schema::invocation::{validate_body, validate_url};
use crate::schema::{Invocation, Region, Template};

/// Every region a probe can be launched from
pub const ALL_REGIONS: [&str; 16] = [
    "ap-northeast-2",
    "ap-south-1",
    "eu-north-1",
    "eu-west-3",
    "eu-west-2",
    "eu-west-1",
    "ap-northeast-1",
    "sa-east-1",
    "ca-central-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "eu-central-1",
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
];

/// A (region, payload) pairing consumed by exactly one dispatch task
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchJob {
    pub region: String,
    pub invocation: Invocation,
}

/// The jobs launched together from one region
#[derive(Debug, Clone, PartialEq)]
pub struct RegionBatch {
    pub region: Region,
    pub jobs: Vec<DispatchJob>,
}

/// Fully resolved region × target matrix for one pass
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchPlan {
    pub template: String,
    pub total_interval: Duration,
    pub batches: Vec<RegionBatch>,
    /// Regions that need private network placement
    pub internal_regions: Vec<String>,
}

impl DispatchPlan {
    pub fn job_count(&self) -> usize {
        self.batches.iter().map(|batch| batch.jobs.len()).sum()
    }

    pub fn region_ids(&self) -> Vec<&str> {
        self.batches.iter().map(|batch| batch.region.region.as_str()).collect()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &DispatchJob> {
        self.batches.iter().flat_map(|batch| batch.jobs.iter())
    }
}

impl fmt::Display for DispatchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Template: {}", self.template)?;
        writeln!(f, "Interval: {}s", self.total_interval.as_secs())?;
        writeln!(f, "Jobs: {}", self.job_count())?;
        writeln!(f, "Regions:")?;
        for batch in &self.batches {
            writeln!(f, "  {} ({} jobs)", batch.region.region, batch.jobs.len())?;
            for job in &batch.jobs {
                writeln!(f, "    {} {}", job.invocation.method, job.invocation.target)?;
            }
        }
        if !self.internal_regions.is_empty() {
            writeln!(f, "Internal regions: {}", self.internal_regions.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Resolver {
    all_regions: bool,
    default_region: String,
    supported: Vec<String>,
    log_level: Option<String>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self {
            all_regions: false,
            default_region: DEFAULT_REGION.to_string(),
            supported: ALL_REGIONS.iter().map(|region| region.to_string()).collect(),
            log_level: None,
        }
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Probe from every supported region in addition to the template's
    pub fn all_regions(mut self, all_regions: bool) -> Self {
        self.all_regions = all_regions;
        self
    }

    /// Region used when the template lists none
    pub fn default_region(mut self, region: impl Into<String>) -> Self {
        self.default_region = region.into();
        self
    }

    pub fn supported_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported = regions.into_iter().map(Into::into).collect();
        self
    }

    /// Log level forwarded to every worker
    pub fn log_level(mut self, level: Option<String>) -> Self {
        self.log_level = level;
        self
    }

    pub fn resolve(&self, template: &Template) -> Result<DispatchPlan, ProbeError> {
        validate_template(template)?;

        let regions = self.regions(template);
        check_available_regions(&regions, template)?;
        check_internal_setting(template)?;

        let timeout = template.timeout_secs();
        let batches = regions
            .into_iter()
            .map(|region| {
                let jobs = template
                    .targets
                    .iter()
                    .filter(|target| target.allows(&region.region))
                    .filter(|target| !target.internal || region.has_placement())
                    .map(|target| {
                        let mut invocation = Invocation::for_target(target, timeout, &template.slack_urls);
                        invocation.log_level = self.log_level.clone();
                        DispatchJob { region: region.region.clone(), invocation }
                    })
                    .collect();
                RegionBatch { region, jobs }
            })
            .collect::<Vec<_>>();

        let plan = DispatchPlan {
            template: template.name.clone(),
            total_interval: template.interval(),
            batches,
            internal_regions: internal_regions(template),
        };
        debug!("resolved {} jobs across {} regions", plan.job_count(), plan.batches.len());

        Ok(plan)
    }

    /// Template regions in order without duplicates, optionally extended with
    /// every supported region, falling back to the default region
    fn regions(&self, template: &Template) -> Vec<Region> {
        let mut seen = BTreeSet::new();
        let mut regions: Vec<Region> = template
            .regions
            .iter()
            .filter(|region| seen.insert(region.region.clone()))
            .cloned()
            .collect();

        if self.all_regions {
            for id in &self.supported {
                if seen.insert(id.clone()) {
                    regions.push(Region::new(id.clone()));
                }
            }
        }

        if regions.is_empty() {
            regions.push(Region::new(self.default_region.clone()));
        }
        regions
    }
}

fn validate_template(template: &Template) -> Result<(), ProbeError> {
    if template.name.trim().is_empty() {
        return Err(ProbeError::config("template name must not be empty"));
    }

    for target in &template.targets {
        validate_url(&target.url)?;
        validate_body(target.method, target.body.as_ref())?;
    }
    Ok(())
}

fn check_available_regions(regions: &[Region], template: &Template) -> Result<(), ProbeError> {
    for target in &template.targets {
        for allowed in &target.regions {
            if !regions.iter().any(|region| &region.region == allowed) {
                return Err(ProbeError::config(format!(
                    "{allowed} is not in the region list: {}",
                    target.url
                )));
            }
        }
    }
    Ok(())
}

fn check_internal_setting(template: &Template) -> Result<(), ProbeError> {
    for target in template.targets.iter().filter(|target| target.internal) {
        if !target.is_restricted() {
            return Err(ProbeError::config(format!(
                "internal target {} must list the regions it is reachable from",
                target.url
            )));
        }

        for allowed in &target.regions {
            let placed = template.region(allowed).is_some_and(Region::has_placement);
            if !placed {
                return Err(ProbeError::config(format!(
                    "{allowed} region has no security groups or subnet settings in region configuration"
                )));
            }
        }
    }
    Ok(())
}

fn internal_regions(template: &Template) -> Vec<String> {
    let mut regions: Vec<String> = Vec::new();
    for target in template.targets.iter().filter(|target| target.internal) {
        for region in &target.regions {
            if !regions.contains(region) {
                regions.push(region.clone());
            }
        }
    }
    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Method, Target};

    fn template(regions: &[&str], targets: Vec<Target>) -> Template {
        Template {
            name: "health".to_string(),
            interval: Some(120),
            timeout: None,
            slack_urls: Vec::new(),
            targets,
            regions: regions.iter().map(|id| Region::new(*id)).collect(),
        }
    }

    #[test]
    fn test_empty_template_regions_use_default() {
        let plan = Resolver::new()
            .default_region("eu-west-1")
            .resolve(&template(&[], vec![Target::new("https://example.com", Method::Get)]))
            .unwrap();

        assert_eq!(plan.region_ids(), vec!["eu-west-1"]);
        assert_eq!(plan.job_count(), 1);
    }

    #[test]
    fn test_duplicate_regions_are_collapsed() {
        let plan = Resolver::new()
            .resolve(&template(
                &["us-east-1", "eu-west-1", "us-east-1"],
                vec![Target::new("https://example.com", Method::Get)],
            ))
            .unwrap();

        assert_eq!(plan.region_ids(), vec!["us-east-1", "eu-west-1"]);
    }

    #[test]
    fn test_all_regions_keeps_template_order_first() {
        let plan = Resolver::new()
            .all_regions(true)
            .resolve(&template(&["us-west-2"], vec![Target::new("https://example.com", Method::Get)]))
            .unwrap();

        assert_eq!(plan.batches.len(), ALL_REGIONS.len());
        assert_eq!(plan.region_ids()[0], "us-west-2");
    }

    #[test]
    fn test_timeout_falls_back_to_template_then_default() {
        let mut slow = Target::new("https://slow.example.com", Method::Get);
        slow.timeout = Some(10);
        let mut tpl = template(&["us-east-1"], vec![slow, Target::new("https://example.com", Method::Get)]);

        let plan = Resolver::new().resolve(&tpl).unwrap();
        let timeouts: Vec<u64> = plan.jobs().map(|job| job.invocation.timeout).collect();
        assert_eq!(timeouts, vec![10, crate::DEFAULT_TIMEOUT_SECS]);

        tpl.timeout = Some(5);
        let plan = Resolver::new().resolve(&tpl).unwrap();
        let timeouts: Vec<u64> = plan.jobs().map(|job| job.invocation.timeout).collect();
        assert_eq!(timeouts, vec![10, 5]);
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let mut tpl = template(&["us-east-1"], Vec::new());
        tpl.name = "  ".to_string();
        assert!(matches!(Resolver::new().resolve(&tpl), Err(ProbeError::Configuration(_))));
    }

    #[test]
    fn test_internal_regions_are_collected_once() {
        let mut tpl = template(&[], Vec::new());
        for id in ["us-east-1", "eu-west-1"] {
            tpl.regions.push(Region {
                region: id.to_string(),
                security_groups: vec!["sg-1".to_string()],
                subnets: vec!["subnet-1".to_string()],
            });
        }
        for url in ["http://10.0.0.1", "http://10.0.0.2"] {
            let mut target = Target::new(url, Method::Get);
            target.internal = true;
            target.regions = vec!["us-east-1".to_string(), "eu-west-1".to_string()];
            tpl.targets.push(target);
        }

        let plan = Resolver::new().resolve(&tpl).unwrap();
        assert_eq!(plan.internal_regions, vec!["us-east-1", "eu-west-1"]);
        assert_eq!(plan.job_count(), 4);
    }

    #[test]
    fn test_plan_display_lists_jobs() {
        let plan = Resolver::new()
            .resolve(&template(&["us-east-1"], vec![Target::new("https://example.com", Method::Post)]))
            .unwrap();
        let rendered = plan.to_string();

        assert!(rendered.contains("Template: health"));
        assert!(rendered.contains("us-east-1 (1 jobs)"));
        assert!(rendered.contains("POST https://example.com"));
    }
}
