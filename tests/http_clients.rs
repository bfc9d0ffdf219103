use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use starbot::mastodon::{MastodonClient, PublishService, StatusRequest};
use starbot::model::Artwork;
use starbot::subsonic::{SourceService, SubsonicClient};

fn subsonic(server: &MockServer) -> SubsonicClient {
    SubsonicClient::new(&server.uri(), "alice".into(), "sesame".into()).unwrap()
}

#[tokio::test]
async fn starred_songs_are_returned_in_server_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/getStarred2"))
        .and(query_param("u", "alice"))
        .and(query_param("f", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subsonic-response": {
                "status": "ok",
                "version": "1.16.1",
                "starred2": {
                    "song": [
                        { "id": "s2", "title": "Second", "artist": "B", "album": "X",
                          "genre": "Rock/Pop", "coverArt": "al-2" },
                        { "id": "s1", "title": "First", "artist": "A", "album": "Y" }
                    ]
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tracks = subsonic(&server).fetch_favorites().await.unwrap();
    let ids: Vec<_> = tracks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["s2", "s1"]);
    assert_eq!(tracks[0].genres, vec!["Rock", "Pop"]);
    assert_eq!(tracks[0].cover_art.as_deref(), Some("al-2"));
}

#[tokio::test]
async fn empty_starred_list_is_ok() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/getStarred2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subsonic-response": { "status": "ok", "starred2": {} }
        })))
        .mount(&server)
        .await;

    assert!(subsonic(&server).fetch_favorites().await.unwrap().is_empty());
}

#[tokio::test]
async fn subsonic_auth_failure_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/getStarred2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subsonic-response": {
                "status": "failed",
                "error": { "code": 40, "message": "Wrong username or password" }
            }
        })))
        .mount(&server)
        .await;

    let err = subsonic(&server).fetch_favorites().await.unwrap_err();
    assert!(format!("{err:#}").contains("40"));
}

#[tokio::test]
async fn subsonic_http_error_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/getStarred2"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let err = subsonic(&server).fetch_favorites().await.unwrap_err();
    assert!(format!("{err:#}").contains("502"));
}

#[tokio::test]
async fn latest_play_is_the_first_scrobble() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/getScrobbles"))
        .and(query_param("count", "10"))
        .and(query_param("u", "alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subsonic-response": {
                "status": "ok",
                "scrobbles": {
                    "song": [
                        { "id": "p2", "title": "Roundabout", "artist": "Yes" },
                        { "id": "p1", "title": "Heart of the Sunrise", "artist": "Yes" }
                    ]
                }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let play = subsonic(&server).fetch_latest_play().await.unwrap().unwrap();
    assert_eq!(play.id, "p2");
    assert_eq!(play.title, "Roundabout");
}

#[tokio::test]
async fn no_scrobbles_means_no_latest_play() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/getScrobbles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subsonic-response": { "status": "ok" }
        })))
        .mount(&server)
        .await;

    assert!(subsonic(&server).fetch_latest_play().await.unwrap().is_none());
}

#[tokio::test]
async fn cover_art_bytes_and_type() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/getCoverArt"))
        .and(query_param("id", "al-2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"),
        )
        .mount(&server)
        .await;

    let art = subsonic(&server).fetch_cover_art("al-2").await.unwrap();
    assert_eq!(art.bytes, vec![0x89, b'P', b'N', b'G']);
    assert_eq!(art.content_type, "image/png");
}

#[tokio::test]
async fn cover_art_error_document_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/getCoverArt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "subsonic-response": {
                "status": "failed",
                "error": { "code": 70, "message": "Artwork not found" }
            }
        })))
        .mount(&server)
        .await;

    let err = subsonic(&server).fetch_cover_art("missing").await.unwrap_err();
    assert!(format!("{err:#}").contains("Artwork not found"));
}

#[tokio::test]
async fn media_upload_returns_media_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/media"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(
            ResponseTemplate::new(202).set_body_json(json!({ "id": "m-77", "type": "image" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = MastodonClient::new(&server.uri(), "tok".into()).unwrap();
    let artwork = Artwork {
        bytes: vec![1, 2, 3],
        content_type: "image/jpeg".into(),
    };
    let id = client.upload_media(&artwork, "Cover art").await.unwrap();
    assert_eq!(id, "m-77");
}

#[tokio::test]
async fn status_is_posted_with_media_and_idempotency_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/statuses"))
        .and(header("authorization", "Bearer tok"))
        .and(header("idempotency-key", "k-1"))
        .and(body_partial_json(json!({
            "status": "New favorite\nA - T",
            "media_ids": ["m-77"],
            "visibility": "public"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "110", "url": "https://x/110" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = MastodonClient::new(&server.uri(), "tok".into()).unwrap();
    let id = client
        .create_status(&StatusRequest {
            text: "New favorite\nA - T".into(),
            media_ids: vec!["m-77".into()],
            visibility: "public".into(),
            idempotency_key: "k-1".into(),
        })
        .await
        .unwrap();
    assert_eq!(id, "110");
}

#[tokio::test]
async fn rate_limited_status_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/statuses"))
        .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
        .mount(&server)
        .await;

    let client = MastodonClient::new(&server.uri(), "tok".into()).unwrap();
    let err = client
        .create_status(&StatusRequest {
            text: "x".into(),
            media_ids: vec![],
            visibility: "public".into(),
            idempotency_key: "k".into(),
        })
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("429"));
}

#[tokio::test]
async fn profile_field_is_patched_as_a_form() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/accounts/update_credentials"))
        .and(header("authorization", "Bearer tok"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string(
            "fields_attributes%5B0%5D%5Bname%5D=Now+playing\
             &fields_attributes%5B0%5D%5Bvalue%5D=Yes+-+Roundabout",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "7", "username": "me" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = MastodonClient::new(&server.uri(), "tok".into()).unwrap();
    client
        .update_profile_field("Now playing", "Yes - Roundabout")
        .await
        .unwrap();
}

#[tokio::test]
async fn rejected_profile_update_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/v1/accounts/update_credentials"))
        .respond_with(ResponseTemplate::new(422).set_body_string("Validation failed"))
        .mount(&server)
        .await;

    let client = MastodonClient::new(&server.uri(), "tok".into()).unwrap();
    let err = client
        .update_profile_field("Now playing", "x")
        .await
        .unwrap_err();
    assert!(format!("{err:#}").contains("422"));
}
