mod common;

use cloudroom::events::{self, EventForm};
use cloudroom::forum::{self, VoteTarget};
use cloudroom::orm::forum_votes::VoteType;
use cloudroom::orm::{forum_comments, forum_posts, teams, users};
use cloudroom::projects::{self, NewProject};
use cloudroom::team::{self, Decision, NewTeam};
use cloudroom::user::{self, AdminUserUpdate, ProfileUpdate};
use cloudroom::{messages, Actor, PortalError, Rank};
use common::{database::*, fixtures::*};
use sea_orm::{entity::*, query::*};

#[actix_rt::test]
async fn test_promotion_to_level_one_sets_admin_flag() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    let admin = create_admin(&db, "admin").await.expect("Failed to create admin");
    let student = create_student(&db, "student").await.expect("Failed to create user");

    let promoted = user::admin_edit_user(
        &db,
        &admin,
        student.user_id,
        AdminUserUpdate {
            privilege_level: Some(1),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to promote");

    assert_eq!(promoted.privilege_level, 1);
    assert!(promoted.is_admin);
    assert!(Actor::from_user(&promoted).has_admin());
}

#[actix_rt::test]
async fn test_demotion_by_admin_keeps_admin_flag() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    let admin = create_admin(&db, "admin").await.expect("Failed to create admin");
    let other = create_admin(&db, "other").await.expect("Failed to create admin");

    // The flag is only cleared by an actor without it, and every actor that
    // gets this far has it. The rank change alone removes admin powers.
    let demoted = user::admin_edit_user(
        &db,
        &admin,
        other.user_id,
        AdminUserUpdate {
            privilege_level: Some(3),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to demote");

    assert_eq!(demoted.privilege_level, 3);
    assert!(demoted.is_admin);
    let demoted = Actor::from_user(&demoted);
    assert_eq!(demoted.rank, Rank::Coordinator);
    assert!(!demoted.has_admin());

    let cleared = user::admin_edit_user(
        &db,
        &admin,
        other.user_id,
        AdminUserUpdate {
            is_admin: Some(false),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to clear flag");
    assert!(!cleared.is_admin);
}

#[actix_rt::test]
async fn test_admin_cannot_demote_self() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    let admin = create_admin(&db, "admin").await.expect("Failed to create admin");

    let unchanged = user::admin_edit_user(
        &db,
        &admin,
        admin.user_id,
        AdminUserUpdate {
            privilege_level: Some(4),
            is_admin: Some(false),
            college: Some("NIT".to_string()),
            ..Default::default()
        },
    )
    .await
    .expect("Self edit should succeed");

    assert_eq!(unchanged.privilege_level, 1);
    assert!(unchanged.is_admin);
    assert_eq!(unchanged.college.as_deref(), Some("NIT"));
}

#[actix_rt::test]
async fn test_admin_edit_rejects_bad_values() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    let admin = create_admin(&db, "admin").await.expect("Failed to create admin");
    let student = create_student(&db, "student").await.expect("Failed to create user");

    let bad_level = user::admin_edit_user(
        &db,
        &admin,
        student.user_id,
        AdminUserUpdate {
            privilege_level: Some(7),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(bad_level, Err(PortalError::InvalidInput(_))));

    let weak_password = user::admin_edit_user(
        &db,
        &admin,
        student.user_id,
        AdminUserUpdate {
            password: Some("short".to_string()),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(weak_password, Err(PortalError::InvalidInput(_))));

    let taken = user::admin_edit_user(
        &db,
        &admin,
        student.user_id,
        AdminUserUpdate {
            username: Some("admin".to_string()),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(taken, Err(PortalError::InvalidInput(_))));

    let by_student = user::admin_edit_user(
        &db,
        &student,
        admin.user_id,
        AdminUserUpdate::default(),
    )
    .await;
    assert!(matches!(by_student, Err(PortalError::Forbidden(_))));

    let new_password = user::admin_edit_user(
        &db,
        &admin,
        student.user_id,
        AdminUserUpdate {
            password: Some(TEST_PASSWORD.to_string()),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to reset password");
    assert!(cloudroom::session::verify_password(
        TEST_PASSWORD,
        &new_password.password_hash
    ));
}

#[actix_rt::test]
async fn test_profile_update_and_search() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    let student = create_student(&db, "student").await.expect("Failed to create user");
    create_student(&db, "bystander").await.expect("Failed to create user");

    let updated = user::update_profile(
        &db,
        &student,
        ProfileUpdate {
            skills: Some("Rust, SQL".to_string()),
            branch: Some("  CSE ".to_string()),
            bio: Some(String::new()),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to update profile");
    assert_eq!(updated.skills.as_deref(), Some("Rust, SQL"));
    assert_eq!(updated.branch.as_deref(), Some("CSE"));
    assert_eq!(updated.bio, None);

    let bad_mobile = user::update_profile(
        &db,
        &student,
        ProfileUpdate {
            mobile: Some("123".to_string()),
            ..Default::default()
        },
    )
    .await;
    assert!(matches!(bad_mobile, Err(PortalError::InvalidInput(_))));

    let found = user::search_users(&db, "rust").await.expect("Failed to search");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, student.user_id);

    let by_name = user::search_users(&db, "STAND").await.expect("Failed to search");
    assert_eq!(by_name.len(), 1);
    assert_eq!(by_name[0].username, "bystander");

    assert!(user::search_users(&db, "  ").await.expect("search").is_empty());
}

#[actix_rt::test]
async fn test_delete_user_hands_over_teams_and_recounts_votes() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    let admin = create_admin(&db, "admin").await.expect("Failed to create admin");
    let doomed = create_student(&db, "doomed").await.expect("Failed to create user");
    let friend = create_student(&db, "friend").await.expect("Failed to create user");

    // A team the doomed user leads, with a second member.
    let led = team::create_team(
        &db,
        &doomed,
        NewTeam {
            name: "Led".to_string(),
            size_limit: Some(3),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create team");
    let request = team::request_join(&db, &friend, led.id)
        .await
        .expect("Failed to request");
    team::resolve_join_request(&db, &doomed, request.id, Decision::Accept)
        .await
        .expect("Failed to accept");

    // A team only the doomed user belongs to.
    let solo = team::create_team(
        &db,
        &doomed,
        NewTeam {
            name: "Solo".to_string(),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create team");

    // Forum activity in both directions.
    let friends_post = create_test_post(&db, friend.user_id, "Friend's post")
        .await
        .expect("Failed to create post");
    let doomed_post = create_test_post(&db, doomed.user_id, "Doomed post")
        .await
        .expect("Failed to create post");
    forum::cast_vote(&db, &doomed, VoteTarget::Post(friends_post.id), VoteType::Upvote)
        .await
        .expect("Failed to vote");
    forum::cast_vote(&db, &friend, VoteTarget::Post(doomed_post.id), VoteType::Upvote)
        .await
        .expect("Failed to vote");
    let doomed_comment = forum::create_comment(&db, &doomed, friends_post.id, "nice", None)
        .await
        .expect("Failed to comment");
    let reply = forum::create_comment(
        &db,
        &friend,
        friends_post.id,
        "thanks",
        Some(doomed_comment.id),
    )
    .await
    .expect("Failed to reply");

    // Everything else the user owns.
    projects::create_project(
        &db,
        &doomed,
        NewProject {
            title: "Portal".to_string(),
            idea: "A campus portal".to_string(),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create project");
    messages::send_direct_message(&db, &friend, doomed.user_id, "hey")
        .await
        .expect("Failed to send");
    let staff = create_test_user(&db, "staff", Rank::Staff, false)
        .await
        .expect("Failed to create user");
    let event = events::create_event(
        &db,
        &Actor::from_user(&staff),
        EventForm::new("Talk", days_from_now(3)),
    )
    .await
    .expect("Failed to create event");
    events::register(&db, &doomed, event.id)
        .await
        .expect("Failed to register");

    let self_delete = user::admin_delete_user(&db, &admin, admin.user_id).await;
    assert!(matches!(self_delete, Err(PortalError::Forbidden(_))));
    let by_friend = user::admin_delete_user(&db, &friend, doomed.user_id).await;
    assert!(matches!(by_friend, Err(PortalError::Forbidden(_))));

    user::admin_delete_user(&db, &admin, doomed.user_id)
        .await
        .expect("Failed to delete user");

    assert!(users::Entity::find_by_id(doomed.user_id)
        .one(&db)
        .await
        .expect("Failed to query user")
        .is_none());

    let led = teams::Entity::find_by_id(led.id)
        .one(&db)
        .await
        .expect("Failed to query team")
        .expect("Team with members should survive");
    assert_eq!(led.leader_id, friend.user_id);
    assert_eq!(led.member_count, 1);

    assert!(teams::Entity::find_by_id(solo.id)
        .one(&db)
        .await
        .expect("Failed to query team")
        .is_none());

    let friends_post = forum_posts::Entity::find_by_id(friends_post.id)
        .one(&db)
        .await
        .expect("Failed to query post")
        .expect("Friend's post should survive");
    assert_eq!((friends_post.upvotes, friends_post.score), (0, 0));

    assert!(forum_posts::Entity::find_by_id(doomed_post.id)
        .one(&db)
        .await
        .expect("Failed to query post")
        .is_none());

    let reply = forum_comments::Entity::find_by_id(reply.id)
        .one(&db)
        .await
        .expect("Failed to query comment")
        .expect("Reply should survive");
    assert_eq!(reply.parent_id, None);

    let event = events::find_event(&db, event.id)
        .await
        .expect("Event should survive");
    assert_eq!(event.created_by, Some(staff.id));

    let dashboard = user::admin_dashboard(&db, &admin)
        .await
        .expect("Failed to load dashboard");
    assert_eq!(dashboard.user_count, 3);
    assert_eq!(dashboard.project_count, 0);
    assert_eq!(dashboard.team_count, 1);
    assert_eq!(dashboard.event_count, 1);
}

#[actix_rt::test]
async fn test_list_users_and_dashboard_are_admin_only() {
    let db = setup_test_database()
        .await
        .expect("Failed to connect to test database");
    let admin = create_admin(&db, "admin").await.expect("Failed to create admin");
    let student = create_student(&db, "student").await.expect("Failed to create user");

    let listed = user::list_users(&db, &admin).await.expect("Failed to list users");
    assert_eq!(listed.len(), 2);

    let refused = user::list_users(&db, &student).await;
    assert!(matches!(refused, Err(PortalError::Forbidden(_))));
    let refused = user::admin_dashboard(&db, &student).await;
    assert!(matches!(refused, Err(PortalError::Forbidden(_))));
}
