use crate::infra::MatchingEngine;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use clap::Args;
use cleanmatch::clock::ManualClock;
use cleanmatch::config::MatchingConfig;
use cleanmatch::directory::{UserDirectory, UserId, UserProfile, UserRole};
use cleanmatch::error::AppError;
use cleanmatch::workflows::booking::{
    ApplicationRequest, BookingRequest, BookingStatus, BookingView, Extras, JobStatusUpdate,
    Location, PaymentMethod, PaymentRequest, PropertyType, Schedule, ServiceType,
};
use cleanmatch::workflows::invitation::{InvitationDetails, InvitationRequest};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

type DemoResult = Result<(), Box<dyn Error>>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Roster CSV to load instead of the built-in demo users
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
    /// Client id placing bookings (must exist in the roster)
    #[arg(long, default_value = "cu-amina")]
    pub(crate) client: String,
    /// Skip the direct invitation portion of the demo
    #[arg(long)]
    pub(crate) skip_invitations: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        roster,
        client,
        skip_invitations,
    } = args;

    let start = Utc
        .with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let clock = ManualClock::new(start);
    let config = MatchingConfig::default();
    let engine = MatchingEngine::in_memory(&config, Arc::new(clock.clone()));

    match roster {
        Some(path) => {
            engine.seed_roster(&path)?;
        }
        None => seed_demo_users(&engine),
    }
    let client = UserId::new(client);

    println!("Cleaning marketplace demo");
    if let Err(err) = marketplace_demo(&engine, &clock, &client) {
        println!("  Marketplace demo stopped: {err}");
    }

    if skip_invitations {
        return Ok(());
    }

    if let Err(err) = invitation_demo(&engine, &clock, &client, &config) {
        println!("  Invitation demo stopped: {err}");
    }
    Ok(())
}

fn seed_demo_users(engine: &MatchingEngine) {
    let people = [
        ("cu-amina", "Amina", "Hassan", UserRole::Client, 5.0),
        ("cl-wanjiru", "Wanjiru", "Kamau", UserRole::Cleaner, 4.8),
        ("cl-otieno", "Otieno", "Odhiambo", UserRole::Cleaner, 4.6),
        ("cl-njeri", "Njeri", "Mwangi", UserRole::Cleaner, 4.9),
    ];
    for (id, first, last, role, rating) in people {
        let mut profile =
            UserProfile::new(UserId::new(id), first, last, format!("{id}@example.com"), role);
        profile.rating = rating;
        if let Err(err) = engine.directory.insert(profile) {
            println!("  Skipped demo user {id}: {err}");
        }
    }
}

fn marketplace_demo(engine: &MatchingEngine, clock: &ManualClock, client: &UserId) -> DemoResult {
    println!("\nMarketplace: post, bid, override, pay, clean");
    let cleaners = engine.directory.available_cleaners(3)?;
    if cleaners.len() < 2 {
        return Err("the marketplace demo needs at least two available cleaners".into());
    }
    let first = &cleaners[0].id;
    let second = &cleaners[1].id;

    let posted = engine.bookings.create(client, demo_booking_request())?;
    let booking_id = posted.booking.id.clone();
    print_booking("Posted", &posted);

    clock.advance(Duration::minutes(2));
    let outcome = engine.bookings.apply(
        first,
        &booking_id,
        ApplicationRequest {
            proposed_price: None,
            message: Some("Happy to take this one".to_string()),
        },
    )?;
    println!(
        "- {} applied (auto-accepted: {})",
        first, outcome.auto_accepted
    );

    clock.advance(Duration::minutes(1));
    let outcome = engine.bookings.apply(
        second,
        &booking_id,
        ApplicationRequest {
            proposed_price: Some(2300),
            message: None,
        },
    )?;
    println!(
        "- {} applied at 2300 (auto-accepted: {})",
        second, outcome.auto_accepted
    );

    let view = engine.bookings.accept_application(client, &booking_id, second)?;
    print_booking("Client picked the cheaper bid", &view);

    let view = engine.bookings.complete_payment(
        client,
        &booking_id,
        PaymentRequest {
            method: PaymentMethod::Mpesa,
            transaction_id: Some("DEMO-0001".to_string()),
        },
    )?;
    print_booking("Paid", &view);

    for status in [BookingStatus::InProgress, BookingStatus::Completed] {
        clock.advance(Duration::hours(2));
        let view = engine.bookings.update_job_status(
            second,
            &booking_id,
            JobStatusUpdate {
                status,
                notes: None,
            },
        )?;
        print_booking("Cleaner update", &view);
    }

    let stats = engine.bookings.stats(client)?;
    println!(
        "- Client stats: {} total | {} open | {} completed | {} spent",
        stats.total, stats.open, stats.completed, stats.total_spent
    );
    if let Some(profile) = engine.directory.fetch(second)? {
        println!("- {} has {} completed jobs", profile.id, profile.completed_jobs);
    }
    Ok(())
}

fn invitation_demo(
    engine: &MatchingEngine,
    clock: &ManualClock,
    client: &UserId,
    config: &MatchingConfig,
) -> DemoResult {
    println!("\nInvitations: one accepted, one left to time out");
    let cleaners = engine.directory.available_cleaners(2)?;
    let Some(cleaner) = cleaners.first() else {
        return Err("the invitation demo needs an available cleaner".into());
    };

    let accepted = engine.invitations.send(
        client,
        InvitationRequest {
            cleaner_id: cleaner.id.clone(),
            booking_details: demo_invitation_details(),
        },
    )?;
    println!(
        "- Invited {} ({}), expires {}",
        accepted.cleaner.first_name, accepted.invitation_id, accepted.expires_at
    );
    clock.advance(Duration::minutes(4));
    engine.invitations.accept(&cleaner.id, &accepted.invitation_id)?;
    let status = engine.invitations.status(client, &accepted.invitation_id)?;
    println!(
        "  -> invitation {:?}, booking {:?}",
        status.status, status.booking_status
    );

    let ignored = engine.invitations.send(
        client,
        InvitationRequest {
            cleaner_id: cleaner.id.clone(),
            booking_details: demo_invitation_details(),
        },
    )?;
    println!("- Invited {} again ({})", cleaner.id, ignored.invitation_id);
    clock.advance(config.invitation_ttl + Duration::minutes(1));
    let report = engine.sweeper.sweep()?;
    println!(
        "  -> sweep expired {} invitation(s), cancelled {} booking(s), {} failure(s)",
        report.invitations_expired, report.bookings_cancelled, report.failures
    );
    let status = engine.invitations.status(client, &ignored.invitation_id)?;
    println!(
        "  -> invitation {:?}, booking {:?}",
        status.status, status.booking_status
    );
    Ok(())
}

fn print_booking(label: &str, view: &BookingView) {
    let cleaner = view
        .cleaner
        .as_ref()
        .map(|cleaner| format!("{} {}", cleaner.first_name, cleaner.last_name))
        .unwrap_or_else(|| "unassigned".to_string());
    println!(
        "- {label}: {} is {} | cleaner {} | {} applicant(s) | payment {:?}",
        view.booking.id,
        view.booking.status,
        cleaner,
        view.applicants.len(),
        view.booking.payment.status
    );
}

fn demo_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 8).unwrap_or(NaiveDate::MIN)
}

fn demo_booking_request() -> BookingRequest {
    BookingRequest {
        service_type: ServiceType::Standard,
        schedule: Schedule {
            date: demo_date(),
            time: "10:00 AM".to_string(),
            frequency: Default::default(),
        },
        location: Location {
            address: "14 Riverside Dr".to_string(),
            city: "Nairobi".to_string(),
            property_type: PropertyType::Apartment,
            bedrooms: 2,
            bathrooms: 1,
            square_footage: 850,
            special_instructions: None,
        },
        extras: Extras {
            window_cleaning: true,
            ..Extras::default()
        },
        total_price: 2500,
        client_notes: Some("Please use the eco products under the sink".to_string()),
    }
}

fn demo_invitation_details() -> InvitationDetails {
    InvitationDetails {
        service_type: ServiceType::Deep,
        date: demo_date(),
        time: "2:00 PM".to_string(),
        location: "22 Kindaruma Rd, Kilimani".to_string(),
        city: None,
        total_price: 4200,
        bedrooms: 3,
        bathrooms: 2,
    }
}
