mod common;

use assert_matches::assert_matches;
use common::TestApp;
use portal_api::{
    entities::user::Role,
    errors::ServiceError,
    services::{branding::BrandingInput, users::CreateUserInput},
};
use uuid::Uuid;

fn new_user(email: &str, role: Role, seller_id: Option<Uuid>) -> CreateUserInput {
    CreateUserInput {
        email: email.to_string(),
        name: "New User".to_string(),
        password: "correct horse battery".to_string(),
        role,
        seller_id,
        document: None,
    }
}

#[tokio::test]
async fn admins_cannot_create_staff_accounts() {
    let app = TestApp::new().await;
    let master = app.seed_user("master@example.com", Role::Master, None).await;
    let admin = app.seed_user("admin@example.com", Role::Admin, None).await;
    let seller = app.seed_user("seller@example.com", Role::Seller, None).await;
    let users = &app.state.services.users;

    assert_matches!(
        users
            .create(&app.session(&admin), new_user("a2@example.com", Role::Admin, None))
            .await,
        Err(ServiceError::Forbidden(_))
    );
    assert_matches!(
        users
            .create(&app.session(&seller), new_user("c@example.com", Role::Customer, None))
            .await,
        Err(ServiceError::Forbidden(_))
    );

    let created = users
        .create(&app.session(&admin), new_user("C@Example.com", Role::Customer, Some(seller.id)))
        .await
        .unwrap();
    assert_eq!(created.email, "c@example.com");
    assert_eq!(created.seller_id, Some(seller.id));
    assert_ne!(created.password_hash, "correct horse battery");

    let admin2 = users
        .create(&app.session(&master), new_user("a2@example.com", Role::Admin, None))
        .await
        .unwrap();
    assert_eq!(admin2.role, Role::Admin);
}

#[tokio::test]
async fn registration_checks_seller_and_email() {
    let app = TestApp::new().await;
    let seller = app.seed_user("seller@example.com", Role::Seller, None).await;
    let customer = app.seed_user("buyer@example.com", Role::Customer, None).await;
    let users = &app.state.services.users;

    assert_matches!(
        users
            .register(new_user("x@example.com", Role::Customer, Some(customer.id)))
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        users
            .register(new_user("y@example.com", Role::Seller, Some(seller.id)))
            .await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        users
            .register(new_user("buyer@example.com", Role::Customer, None))
            .await,
        Err(ServiceError::Conflict(_))
    );

    let mut short = new_user("z@example.com", Role::Customer, None);
    short.password = "short".to_string();
    assert_matches!(users.register(short).await, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn admins_do_not_see_masters() {
    let app = TestApp::new().await;
    let master = app.seed_user("master@example.com", Role::Master, None).await;
    let admin = app.seed_user("admin@example.com", Role::Admin, None).await;
    app.seed_user("buyer@example.com", Role::Customer, None).await;
    let users = &app.state.services.users;

    let (visible, total) = users.list(&app.session(&admin), 1, 20).await.unwrap();
    assert_eq!(total, 2);
    assert!(visible.iter().all(|u| u.role != Role::Master));

    let (_, total) = users.list(&app.session(&master), 1, 20).await.unwrap();
    assert_eq!(total, 3);

    assert_matches!(
        users.set_active(&app.session(&admin), master.id, false).await,
        Err(ServiceError::NotFound(_))
    );
}

#[tokio::test]
async fn deactivation_rules() {
    let app = TestApp::new().await;
    let admin = app.seed_user("admin@example.com", Role::Admin, None).await;
    let other_admin = app.seed_user("admin2@example.com", Role::Admin, None).await;
    let customer = app.seed_user("buyer@example.com", Role::Customer, None).await;
    let users = &app.state.services.users;
    let session = app.session(&admin);

    assert_matches!(
        users.set_active(&session, admin.id, false).await,
        Err(ServiceError::InvalidOperation(_))
    );
    assert_matches!(
        users.set_active(&session, other_admin.id, false).await,
        Err(ServiceError::Forbidden(_))
    );

    let disabled = users.set_active(&session, customer.id, false).await.unwrap();
    assert!(!disabled.is_active);
}

#[tokio::test]
async fn login_issues_a_session_for_active_users_only() {
    let app = TestApp::new().await;
    let master = app.seed_user("master@example.com", Role::Master, None).await;
    let user = app
        .state
        .services
        .users
        .register(new_user("buyer@example.com", Role::Customer, None))
        .await
        .unwrap();
    let auth = &app.state.auth;

    let login = auth
        .login(" Buyer@Example.com ", "correct horse battery")
        .await
        .unwrap();
    let session = auth.validate_token(&login.token.access_token).unwrap();
    assert_eq!(session.user_id, user.id);
    assert_eq!(session.role, Role::Customer);

    assert_matches!(
        auth.login("buyer@example.com", "wrong password").await,
        Err(ServiceError::Unauthorized(_))
    );
    assert_matches!(
        auth.login("nobody@example.com", "correct horse battery").await,
        Err(ServiceError::Unauthorized(_))
    );

    app.state
        .services
        .users
        .set_active(&app.session(&master), user.id, false)
        .await
        .unwrap();
    assert_matches!(
        auth.login("buyer@example.com", "correct horse battery").await,
        Err(ServiceError::Forbidden(_))
    );
}

#[tokio::test]
async fn branding_defaults_until_saved() {
    let app = TestApp::new().await;
    let admin = app.seed_user("admin@example.com", Role::Admin, None).await;
    let customer = app.seed_user("buyer@example.com", Role::Customer, None).await;
    let branding = &app.state.services.branding;

    let defaults = branding.get().await.unwrap();
    assert_eq!(defaults.company_name, "Sales Portal");
    assert_eq!(defaults.primary_color, "#1e40af");

    let input = BrandingInput {
        company_name: "Hydro Supplies".to_string(),
        logo_url: Some("https://cdn.example.com/logo.png".to_string()),
        primary_color: "#0f766e".to_string(),
        contact_email: Some("sales@hydro.example".to_string()),
        phone: None,
        address: None,
    };

    assert_matches!(
        branding.update(&app.session(&customer), input.clone()).await,
        Err(ServiceError::Forbidden(_))
    );

    branding.update(&app.session(&admin), input.clone()).await.unwrap();
    let saved = branding
        .update(
            &app.session(&admin),
            BrandingInput {
                phone: Some("+55 11 5555-0000".to_string()),
                ..input
            },
        )
        .await
        .unwrap();
    assert_eq!(saved.phone.as_deref(), Some("+55 11 5555-0000"));

    let current = branding.get().await.unwrap();
    assert_eq!(current.company_name, "Hydro Supplies");
    assert_eq!(current.primary_color, "#0f766e");
    assert_eq!(current.id, saved.id);

    let mut bad_color = BrandingInput {
        company_name: "Hydro".to_string(),
        logo_url: None,
        primary_color: "teal".to_string(),
        contact_email: None,
        phone: None,
        address: None,
    };
    assert_matches!(
        branding.update(&app.session(&admin), bad_color.clone()).await,
        Err(ServiceError::ValidationError(_))
    );
    bad_color.primary_color = "#0F766E".to_string();
    assert!(branding.update(&app.session(&admin), bad_color).await.is_ok());
}
