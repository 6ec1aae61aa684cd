mod common;

use cloudroom::events::{self, EventForm, EventUpdate};
use cloudroom::orm::events::{DEFAULT_COLOR, DEFAULT_EVENT_TYPE};
use cloudroom::orm::{registrations, teams};
use cloudroom::team::{self, NewTeam};
use cloudroom::{Actor, PortalError, Rank};
use common::{database::*, fixtures::*};
use sea_orm::{entity::*, query::*, DatabaseConnection};

async fn create_actor(db: &DatabaseConnection, username: &str, rank: Rank) -> Actor {
    let user = create_test_user(db, username, rank, false)
        .await
        .expect("Failed to create user");
    Actor::from_user(&user)
}

#[actix_rt::test]
async fn test_event_creation_rank_gates() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    let student = create_actor(&db, "student", Rank::Student).await;
    let coordinator = create_actor(&db, "coord", Rank::Coordinator).await;
    let staff = create_actor(&db, "staff", Rank::Staff).await;

    let refused =
        events::create_event(&db, &student, EventForm::new("Meetup", days_from_now(5))).await;
    assert!(matches!(refused, Err(PortalError::Forbidden(_))));

    let mut form = EventForm::new("Workshop", days_from_now(5));
    form.event_type = Some("workshop".to_string());
    form.color = Some("#ff0000".to_string());
    let plain = events::create_event(&db, &coordinator, form.clone())
        .await
        .expect("Coordinator may create events");
    assert_eq!(plain.event_type, DEFAULT_EVENT_TYPE);
    assert_eq!(plain.color, DEFAULT_COLOR);
    assert_eq!(plain.created_by, Some(coordinator.user_id));

    let calendar = events::create_calendar_event(&db, &coordinator, form.clone()).await;
    assert!(matches!(calendar, Err(PortalError::Forbidden(_))));

    let calendar = events::create_calendar_event(&db, &staff, form)
        .await
        .expect("Staff may create calendar events");
    assert_eq!(calendar.event_type, "workshop");
    assert_eq!(calendar.color, "#ff0000");

    assert_eq!(count_events(&db).await, 2);
}

#[actix_rt::test]
async fn test_event_input_validation() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    let staff = create_actor(&db, "staff", Rank::Staff).await;

    let blank = events::create_event(&db, &staff, EventForm::new("  ", days_from_now(1))).await;
    assert!(matches!(blank, Err(PortalError::InvalidInput(_))));

    let mut backwards = EventForm::new("Backwards", days_from_now(3));
    backwards.end_date = Some(days_from_now(1));
    let backwards = events::create_event(&db, &staff, backwards).await;
    assert!(matches!(backwards, Err(PortalError::InvalidInput(_))));
}

#[actix_rt::test]
async fn test_coordinator_may_only_change_own_events() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    let alice = create_actor(&db, "alice", Rank::Coordinator).await;
    let bob = create_actor(&db, "bob", Rank::Coordinator).await;
    let staff = create_actor(&db, "staff", Rank::Staff).await;

    let event = events::create_event(&db, &alice, EventForm::new("Alice's talk", days_from_now(2)))
        .await
        .expect("Failed to create event");

    let update = EventUpdate {
        title: Some("Bob's talk".to_string()),
        ..Default::default()
    };
    let by_bob = events::edit_event(&db, &bob, event.id, update.clone()).await;
    assert!(matches!(by_bob, Err(PortalError::Forbidden(_))));

    let by_alice = events::edit_event(
        &db,
        &alice,
        event.id,
        EventUpdate {
            location: Some("Hall B".to_string()),
            color: Some("#000000".to_string()),
            ..Default::default()
        },
    )
    .await
    .expect("Owner may edit");
    assert_eq!(by_alice.location.as_deref(), Some("Hall B"));
    assert_eq!(by_alice.color, DEFAULT_COLOR, "coordinators cannot recolour");

    let by_staff = events::edit_event(&db, &staff, event.id, update)
        .await
        .expect("Staff may edit any event");
    assert_eq!(by_staff.title, "Bob's talk");

    let delete_by_bob = events::delete_event(&db, &bob, event.id).await;
    assert!(matches!(delete_by_bob, Err(PortalError::Forbidden(_))));
    events::delete_event(&db, &alice, event.id)
        .await
        .expect("Owner may delete");
    assert_eq!(count_events(&db).await, 0);
}

#[actix_rt::test]
async fn test_register_once_and_get_url() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    let staff = create_actor(&db, "staff", Rank::Staff).await;
    let student = create_actor(&db, "student", Rank::Student).await;

    let mut form = EventForm::new("Hackathon", days_from_now(10));
    form.register_url = Some("https://forms.example/hack".to_string());
    let event = events::create_event(&db, &staff, form)
        .await
        .expect("Failed to create event");

    let registration = events::register(&db, &student, event.id)
        .await
        .expect("Failed to register");
    assert_eq!(
        registration.register_url.as_deref(),
        Some("https://forms.example/hack")
    );
    assert_eq!(registration.registration.user_id, student.user_id);

    let again = events::register(&db, &student, event.id).await;
    assert!(matches!(again, Err(PortalError::AlreadyRegistered)));

    let missing = events::register(&db, &student, 999).await;
    assert!(matches!(missing, Err(PortalError::NotFound(_))));

    let mine = events::my_registrations(&db, &student)
        .await
        .expect("Failed to list registrations");
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].1.as_ref().map(|e| e.id), Some(event.id));
}

#[actix_rt::test]
async fn test_delete_event_removes_registrations_and_unlinks_teams() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    let staff = create_actor(&db, "staff", Rank::Staff).await;
    let student = create_actor(&db, "student", Rank::Student).await;

    let event = events::create_event(&db, &staff, EventForm::new("Hackathon", days_from_now(10)))
        .await
        .expect("Failed to create event");
    events::register(&db, &student, event.id)
        .await
        .expect("Failed to register");
    let t = team::create_team(
        &db,
        &student,
        NewTeam {
            name: "Hack team".to_string(),
            event_id: Some(event.id),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create team");

    events::delete_event(&db, &staff, event.id)
        .await
        .expect("Failed to delete event");

    let registrations = registrations::Entity::find()
        .count(&db)
        .await
        .expect("Failed to count registrations");
    assert_eq!(registrations, 0);

    let t = teams::Entity::find_by_id(t.id)
        .one(&db)
        .await
        .expect("Failed to query team")
        .expect("Team should survive its event");
    assert_eq!(t.event_id, None);
}

#[actix_rt::test]
async fn test_upcoming_events_skip_past_ones() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    let staff = create_actor(&db, "staff", Rank::Staff).await;

    events::create_event(&db, &staff, EventForm::new("Later", days_from_now(7)))
        .await
        .expect("Failed to create event");
    events::create_event(&db, &staff, EventForm::new("Past", days_from_now(-7)))
        .await
        .expect("Failed to create event");
    events::create_event(&db, &staff, EventForm::new("Soon", days_from_now(1)))
        .await
        .expect("Failed to create event");

    let upcoming = events::upcoming_events(&db, days_from_now(0))
        .await
        .expect("Failed to list events");
    let titles: Vec<&str> = upcoming.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Soon", "Later"]);

    let all = events::list_events(&db).await.expect("Failed to list events");
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].title, "Past");
}
