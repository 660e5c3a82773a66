use std::sync::{Arc, Mutex};

use ti_markdown_core::{
    Editor, EditorFactory, FAILED_IMAGE_URL, ImageUploader, Node, PARAGRAPH, Point, UploadError,
    UploadFile, upload_images,
};

struct FakeUploader;

impl ImageUploader for FakeUploader {
    async fn upload(&self, file: UploadFile) -> Result<String, UploadError> {
        if file.name.starts_with("bad") {
            return Err(UploadError::Rejected(file.name));
        }
        Ok(format!("https://cdn.example.com/{}", file.name))
    }
}

fn editor(children: Vec<Node>) -> Editor {
    Editor::new(EditorFactory::markdown().unwrap(), children).unwrap()
}

fn png(name: &str) -> UploadFile {
    UploadFile::new(name, "image/png", vec![0x89, b'P', b'N', b'G'])
}

#[tokio::test]
async fn uploaded_images_land_at_the_cursor() {
    let mut editor = editor(vec![Node::paragraph("x")]);
    editor.select(Point::new(vec![0, 0], 1));

    assert!(upload_images(&mut editor, &FakeUploader, vec![png("a.png")]).await.unwrap());
    assert_eq!(
        editor.children()[0],
        Node::element(
            PARAGRAPH,
            vec![
                Node::text("x "),
                Node::image("https://cdn.example.com/a.png", "a.png"),
                Node::text(" "),
            ]
        )
    );
}

#[tokio::test]
async fn failed_uploads_get_a_placeholder_and_one_alert() {
    let mut editor = editor(vec![Node::paragraph("")]);
    let alerts = Arc::new(Mutex::new(Vec::new()));
    let sink = alerts.clone();
    editor.set_on_alert(move |title, message| {
        sink.lock()
            .unwrap()
            .push((title.to_string(), message.to_string()));
    });
    editor.select(Point::new(vec![0, 0], 0));

    let files = vec![png("a.png"), png("bad-1.png"), png("bad-2.png")];
    assert!(upload_images(&mut editor, &FakeUploader, files).await.unwrap());

    let Node::Element(paragraph) = &editor.children()[0] else {
        panic!("expected paragraph");
    };
    let urls: Vec<&str> = paragraph
        .children
        .iter()
        .filter_map(|child| child.as_element()?.attr_str("url"))
        .collect();
    assert_eq!(
        urls,
        vec![
            "https://cdn.example.com/a.png",
            FAILED_IMAGE_URL,
            FAILED_IMAGE_URL
        ]
    );
    assert_eq!(
        *alerts.lock().unwrap(),
        vec![(
            "Upload failed".to_string(),
            "2 images failed to upload".to_string()
        )]
    );
}

#[tokio::test]
async fn edits_during_the_upload_move_the_target() {
    let mut editor = editor(vec![Node::paragraph("ab")]);
    editor.select(Point::new(vec![0, 0], 2));
    let pending = editor.begin_image_upload(vec![png("a.png")]).unwrap();

    editor
        .insert_text_at(&Point::new(vec![0, 0], 0), "zz")
        .unwrap();
    let results = pending.upload(&FakeUploader).await;
    assert!(editor.complete_image_upload(pending, results).unwrap());

    let Node::Element(paragraph) = &editor.children()[0] else {
        panic!("expected paragraph");
    };
    assert_eq!(paragraph.children[0], Node::text("zzab "));
}

#[tokio::test]
async fn removed_target_drops_the_images() {
    let mut editor = editor(vec![Node::paragraph("x"), Node::paragraph("y")]);
    editor.select(Point::new(vec![0, 0], 1));
    let pending = editor.begin_image_upload(vec![png("a.png")]).unwrap();

    editor.remove_node(&[0]).unwrap();
    let before = editor.children();
    let results = pending.upload(&FakeUploader).await;
    assert!(!editor.complete_image_upload(pending, results).unwrap());
    assert_eq!(editor.children(), before);
}

#[tokio::test]
async fn nothing_happens_without_a_selection_or_files() {
    let mut editor = editor(vec![Node::paragraph("x")]);
    assert!(!upload_images(&mut editor, &FakeUploader, vec![png("a.png")]).await.unwrap());

    editor.select(Point::new(vec![0, 0], 0));
    assert!(editor.begin_image_upload(Vec::new()).is_none());
    assert_eq!(editor.children(), vec![Node::paragraph("x")]);
}

#[test]
fn only_image_mime_types_count_as_images() {
    assert!(png("a.png").is_image());
    assert!(!UploadFile::new("a.txt", "text/plain", Vec::new()).is_image());
}
