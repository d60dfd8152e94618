use std::time::Duration;

use drop_tint::events::DragEvent;
use drop_tint::tasks::watch;
use image::{ImageFormat, Rgba, RgbaImage};
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_image_in_drop_folder_becomes_a_drop() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();

    let task = tokio::spawn(watch::run(
        root.clone(),
        Duration::from_millis(100),
        tx,
        cancel.clone(),
    ));
    // give the watcher time to register
    sleep(Duration::from_millis(300)).await;

    std::fs::write(root.join("notes.txt"), b"ignored").unwrap();
    let image = root.join("drop.png");
    RgbaImage::from_pixel(2, 2, Rgba([1, 2, 3, 255]))
        .save_with_format(&image, ImageFormat::Png)
        .unwrap();

    let event = timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("no drop from watcher")
        .expect("watcher channel closed");
    match event {
        DragEvent::Drop(paths) => {
            assert_eq!(paths.len(), 1);
            assert_eq!(paths[0].file_name().unwrap(), "drop.png");
        }
        other => panic!("unexpected event {other:?}"),
    }

    // the text file never turns into a drop, and the image is reported once
    assert!(
        timeout(Duration::from_millis(500), rx.recv()).await.is_err(),
        "unexpected extra drop"
    );

    cancel.cancel();
    task.await.unwrap().unwrap();
}

#[tokio::test]
async fn missing_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, _rx) = mpsc::channel(1);
    let result = watch::run(
        dir.path().join("absent"),
        Duration::from_millis(10),
        tx,
        CancellationToken::new(),
    )
    .await;
    assert!(result.is_err());
}
