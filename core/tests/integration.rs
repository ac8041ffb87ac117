//! End-to-end fetches against the live mock server.
//!
//! Starts the mock server on a random port, then drives `HttpClient` over
//! real HTTP with the default ureq transport.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use fetch_core::{Delivery, FetchError, HttpClient, MainQueue, UreqTransport};
use mock_server::{Number, User, PIXEL_SIZE};
use tokio::sync::{mpsc, oneshot};

/// One mock server shared by every test in this file.
fn server() -> SocketAddr {
    static ADDR: OnceLock<SocketAddr> = OnceLock::new();
    *ADDR.get_or_init(|| {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = std_listener.local_addr().unwrap();
        std_listener.set_nonblocking(true).unwrap();

        std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async {
                let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
                mock_server::run(listener).await
            })
            .unwrap();
        });
        addr
    })
}

fn client() -> HttpClient {
    HttpClient::new(&format!("http://{}", server()))
}

#[tokio::test]
async fn fetch_json_decodes_user() {
    let (tx, rx) = oneshot::channel();
    client().fetch_json::<User, _>("/users/1", move |result| {
        let _ = tx.send(result);
    });
    let user = rx.await.unwrap().unwrap();
    assert_eq!(
        user,
        User {
            id: 1,
            name: "Ada".to_string()
        }
    );
}

#[tokio::test]
async fn get_json_decodes_list() {
    let users: Vec<User> = client().get_json("/users").await.unwrap();
    assert_eq!(users.len(), 3);
    assert_eq!(users[1].name, "Grace");
}

#[tokio::test]
async fn not_found_with_empty_body_is_empty_body() {
    let err = client().get_json::<User>("/users/42").await.unwrap_err();
    assert!(matches!(err, FetchError::EmptyBody), "{err:?}");
}

#[tokio::test]
async fn empty_body_for_both_paths() {
    let c = client();
    let err = c.get_json::<User>("/empty").await.unwrap_err();
    assert!(matches!(err, FetchError::EmptyBody));
    let err = c.get_image("/empty").await.unwrap_err();
    assert!(matches!(err, FetchError::EmptyBody));
}

#[tokio::test]
async fn non_json_body_is_decode_error() {
    let err = client().get_json::<User>("/garbage").await.unwrap_err();
    assert!(matches!(err, FetchError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn fetch_image_decodes_png() {
    let (tx, rx) = oneshot::channel();
    client().fetch_image("/images/pixel.png", move |result| {
        let _ = tx.send(result);
    });
    let image = rx.await.unwrap().unwrap();
    assert_eq!((image.width(), image.height()), PIXEL_SIZE);
}

#[tokio::test]
async fn broken_image_reads_as_empty_body() {
    let err = client().get_image("/images/broken.png").await.unwrap_err();
    assert!(matches!(err, FetchError::EmptyBody));
}

#[tokio::test]
async fn unreachable_host_is_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let c = HttpClient::new(&format!("http://{addr}"));
    let err = c.get_json::<User>("/users/1").await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)), "{err:?}");
}

#[tokio::test]
async fn strict_agent_turns_status_errors_into_transport_errors() {
    let agent = ureq::Agent::config_builder()
        .http_status_as_error(true)
        .build()
        .new_agent();
    let c = HttpClient::builder(&format!("http://{}", server()))
        .transport(Arc::new(UreqTransport::with_agent(agent)))
        .build();
    let err = c.get_json::<User>("/users/42").await.unwrap_err();
    assert!(matches!(err, FetchError::Transport(_)), "{err:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_calls_complete_independently() {
    const N: u64 = 32;
    let c = client();
    let (tx, mut rx) = mpsc::unbounded_channel();

    for n in 0..N {
        let tx = tx.clone();
        c.fetch_json::<Number, _>(&format!("/numbers/{n}"), move |result| {
            let _ = tx.send((n, result));
        });
    }
    drop(tx);

    let mut seen = HashMap::new();
    while let Some((n, result)) = rx.recv().await {
        let number = result.unwrap();
        assert_eq!(number.n, n, "response matched to the wrong request");
        assert_eq!(number.square, n * n);
        assert!(seen.insert(n, ()).is_none(), "callback for {n} ran twice");
    }
    assert_eq!(seen.len() as u64, N);
}

#[test]
fn callbacks_work_without_an_ambient_runtime() {
    let (tx, rx) = std::sync::mpsc::channel();
    client().fetch_json::<User, _>("/users/3", move |result| {
        let _ = tx.send(result.map(|u| u.name));
    });
    let name = rx
        .recv_timeout(std::time::Duration::from_secs(10))
        .unwrap()
        .unwrap();
    assert_eq!(name, "Linus");
}

#[test]
fn main_queue_receives_success_on_owner_thread() {
    let mut queue = MainQueue::new();
    let c = HttpClient::builder(&format!("http://{}", server()))
        .delivery(Delivery::on(queue.dispatcher()))
        .build();

    let (tx, rx) = std::sync::mpsc::channel();
    c.fetch_json::<User, _>("/users/2", move |result| {
        let _ = tx.send((std::thread::current().id(), result.map(|u| u.id).ok()));
    });

    queue.blocking_run_next();
    let (thread, id) = rx.try_recv().unwrap();
    assert_eq!(thread, std::thread::current().id());
    assert_eq!(id, Some(2));
}
