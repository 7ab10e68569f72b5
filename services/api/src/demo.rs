use crate::infra::RecordingNotifier;
use clap::Args;
use enrollment::config::AllocationConfig;
use enrollment::error::AppError;
use enrollment::workflows::admission::{
    AdmissionService, CourseId, CourseSettings, EnrollmentRequest, EnrollmentStatusView, EventId,
    EventSettings, InMemoryCapacityStore, RegistrationRequest, UserId,
};
use enrollment::workflows::quota_import::QuotaImporter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const DEMO_CLASS_SIZE: u32 = 2;

type DemoService = AdmissionService<InMemoryCapacityStore, RecordingNotifier>;

const DEMO_CPFS: [&str; 5] = [
    "529.982.247-25",
    "111.444.777-35",
    "101.234.567-03",
    "102.469.134-95",
    "103.703.701-47",
];

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Optional `state,city,limit,waitlist_limit` CSV seeding a region-restricted course
    #[arg(long)]
    pub(crate) quota_csv: Option<PathBuf>,
    /// Default class size for municipalities created during the demo
    #[arg(long)]
    pub(crate) class_size: Option<u32>,
    /// Skip the event registration portion of the demo
    #[arg(long)]
    pub(crate) skip_event: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let notifier = RecordingNotifier::default();
    let service = AdmissionService::new(
        Arc::new(InMemoryCapacityStore::new()),
        Arc::new(notifier.clone()),
        AllocationConfig {
            default_municipality_limit: args
                .class_size
                .filter(|size| *size > 0)
                .unwrap_or(DEMO_CLASS_SIZE),
            ..AllocationConfig::default()
        },
    );

    println!("=== Course enrollment ===");
    run_single_seat_course(&service)?;

    if let Some(path) = args.quota_csv.as_ref() {
        println!();
        println!("=== Regional quotas from {} ===", path.display());
        run_regional_course(&service, path)?;
    }

    if !args.skip_event {
        println!();
        println!("=== Event registration ===");
        run_event(&service)?;
    }

    println!();
    println!("Notifications dispatched: {}", notifier.sent().len());
    for notification in notifier.sent() {
        println!(
            "  [{}] {} -> {}",
            notification.template.label(),
            notification.recipient,
            notification.message
        );
    }
    Ok(())
}

fn run_single_seat_course(service: &DemoService) -> Result<(), AppError> {
    let course_id = CourseId("demo-single-seat".to_string());
    service.configure_course(CourseSettings {
        course_id: course_id.clone(),
        title: "Single Seat Workshop".to_string(),
        max_enrollments: Some(1),
        waitlist_enabled: true,
        waitlist_limit: Some(1),
        region_restriction_enabled: false,
        allow_all_regions: false,
        enrollment_open: true,
    })?;
    println!("max_enrollments=1, waitlist limit=1");

    for user in ["ana", "bruno", "carla"] {
        let enrollment = service.enroll(EnrollmentRequest {
            course_id: course_id.clone(),
            user_id: UserId(user.to_string()),
            state: None,
            city: None,
        })?;
        print_enrollment(user, &enrollment.status_view());
    }
    Ok(())
}

fn run_regional_course(service: &DemoService, path: &Path) -> Result<(), AppError> {
    let course_id = CourseId("demo-regional".to_string());
    service.configure_course(CourseSettings {
        course_id: course_id.clone(),
        title: "Regional Bootcamp".to_string(),
        max_enrollments: None,
        waitlist_enabled: true,
        waitlist_limit: None,
        region_restriction_enabled: true,
        allow_all_regions: false,
        enrollment_open: true,
    })?;

    let summary = QuotaImporter::from_path(service, &course_id, path)?;
    println!(
        "Imported quotas: {} inserted, {} updated",
        summary.inserted, summary.updated
    );

    let roster = service.course_roster(&course_id)?;
    for quota in &roster.quotas {
        let region = quota.region.split('/').collect::<Vec<_>>();
        let (state, city) = match region.as_slice() {
            [city, state] => (state.to_string(), Some(city.to_string())),
            _ => (quota.region.clone(), None),
        };
        for slot in 0..=quota.limit {
            let user = format!("{}-{}", quota.region.replace('/', "-").to_lowercase(), slot);
            let enrollment = service.enroll(EnrollmentRequest {
                course_id: course_id.clone(),
                user_id: UserId(user.clone()),
                state: Some(state.clone()),
                city: city.clone(),
            })?;
            print_enrollment(&user, &enrollment.status_view());
        }
    }
    Ok(())
}

fn run_event(service: &DemoService) -> Result<(), AppError> {
    let event_id = EventId("demo-forum".to_string());
    service.configure_event(EventSettings {
        event_id: event_id.clone(),
        title: "Forum de Inovacao".to_string(),
        registration_open: true,
    })?;

    for (index, cpf) in DEMO_CPFS.iter().enumerate() {
        let receipt = service.register(RegistrationRequest {
            event_id: event_id.clone(),
            cpf: cpf.to_string(),
            full_name: format!("Participante {}", index + 1),
            email: None,
            municipality: "Fortaleza".to_string(),
            state: "CE".to_string(),
        })?;
        let rolled = match &receipt.admission.opened {
            Some(next) => format!(" (class closed, class {} opened)", next.class_number),
            None => String::new(),
        };
        println!(
            "- registration {} -> Fortaleza/CE class {}{}",
            index + 1,
            receipt.admission.class.class_number,
            rolled
        );
    }

    let roster = service.event_roster(&event_id)?;
    for municipality in &roster.municipalities {
        println!(
            "{}/{} (class size {})",
            municipality.municipality, municipality.state, municipality.default_limit
        );
        for class in &municipality.classes {
            println!(
                "  class {}: {}/{} {:?}",
                class.class_number, class.current_count, class.limit, class.status
            );
        }
    }
    Ok(())
}

fn print_enrollment(user: &str, view: &EnrollmentStatusView) {
    let detail = match (view.waitlist_position, view.eligibility_reason) {
        (Some(position), _) => format!(" (position {position})"),
        (None, Some(reason)) => format!(" ({reason})"),
        (None, None) => String::new(),
    };
    println!("- {user}: {}{}", view.status, detail);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn demo_runs_both_walkthroughs() {
        run_demo(DemoArgs::default()).expect("demo completes");
    }

    #[test]
    fn demo_seeds_quotas_from_csv() {
        let path = std::env::temp_dir().join(format!("demo-quotas-{}.csv", std::process::id()));
        let mut file = std::fs::File::create(&path).expect("temp file");
        writeln!(file, "state,city,limit,waitlist_limit").expect("write header");
        writeln!(file, "CE,,1,1").expect("write row");
        writeln!(file, "CE,Fortaleza,1,").expect("write row");
        drop(file);

        let result = run_demo(DemoArgs {
            quota_csv: Some(path.clone()),
            class_size: None,
            skip_event: true,
        });
        std::fs::remove_file(&path).ok();
        result.expect("demo completes");
    }
}
