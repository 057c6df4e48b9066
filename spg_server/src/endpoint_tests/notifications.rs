use actix_web::{http::StatusCode, test::TestRequest};
use serde_json::Value;
use spg_engine::{db_types::NewNotification, NotificationStore, SqliteDatabase};

use super::{helpers::*, mocks::MockGateway};

async fn notify(db: &SqliteDatabase, user: &str, title: &str) -> i64 {
    let notification = NewNotification {
        user_id: user.into(),
        title: title.into(),
        message: format!("{title} for {user}"),
        kind: "order".into(),
        url: None,
    };
    db.append_notification(notification).await.unwrap().id
}

#[actix_web::test]
async fn users_only_see_their_own_notifications() {
    let db = prepare_db().await;
    notify(&db, "alice", "First").await;
    notify(&db, "bob", "Not yours").await;
    notify(&db, "alice", "Second").await;
    let req = TestRequest::get().uri("/api/notifications").insert_header(bearer(&valid_token("alice")));
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["title"], "Second");
    assert_eq!(list[1]["title"], "First");
    assert_eq!(list[0]["type"], "order");
    assert!(list[0]["read_at"].is_null());
}

#[actix_web::test]
async fn marking_a_notification_read() {
    let db = prepare_db().await;
    let id = notify(&db, "alice", "Payment confirmed").await;
    let path = format!("/api/notifications/{id}/read");

    let req = TestRequest::post().uri(&path).insert_header(bearer(&valid_token("bob")));
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let req = TestRequest::post().uri(&path).insert_header(bearer(&valid_token("alice")));
    let (status, body) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["id"], id);
    assert!(!body["read_at"].is_null());

    let req = TestRequest::post().uri("/api/notifications/not-a-number/read").insert_header(bearer(&valid_token("alice")));
    let (status, _) = send(&db, MockGateway::new(), req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
