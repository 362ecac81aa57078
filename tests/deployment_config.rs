use duramq::config::DeploymentConfig;
use tempfile::tempdir;

#[test]
fn deploy_from_json_wires_up_a_working_publisher_and_subscriber() {
    let dir = tempdir().expect("tempdir");
    let queue_path = dir.path().join("events");

    let text = serde_json::json!({
        "queues": {
            queue_path.to_str().unwrap(): {
                "subscribers": ["consumer"]
            }
        },
        "pub": {
            "producer": {
                "out_queue": queue_path.to_str().unwrap(),
                "subscribers": ["consumer"]
            }
        },
        "sub": {
            "consumer": { "in_queue": queue_path.to_str().unwrap() }
        }
    })
    .to_string();

    let config = DeploymentConfig::from_json(&text).expect("parse config");
    config.deploy().expect("deploy");

    let publisher = config.open_publisher("producer").expect("open publisher");
    publisher.send(b"hello from config").expect("send");

    let subscriber = config.open_subscriber("consumer").expect("open subscriber");
    let received = subscriber.receive().expect("receive").expect("a message");
    assert_eq!(received.payload(), b"hello from config");
}
