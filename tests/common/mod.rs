//! Shared fixtures for integration tests: a mock Open Images mirror

#![allow(dead_code)]

use mockito::{Matcher, Mock, ServerGuard};
use std::path::Path;
use zoofetch::{OpenImagesV7, ZooLoader};

pub const CLASSES_PATH: &str = "/v7/oidv7-class-descriptions.csv";
pub const VALIDATION_LABELS_PATH: &str = "/v7/oidv7-val-annotations-human-imagelabels.csv";
pub const VALIDATION_BOXES_PATH: &str = "/v5/validation-annotations-bbox.csv";

pub const CLASSES: &str = "LabelName,DisplayName\n\
    /m/01yrx,Cat\n\
    /m/0bt9lr,Dog\n\
    /m/015p6,Bird\n";

/// Cat: 000a, 000e. Dog: 000b, 000e. Bird only: 000c. Cat verified absent: 000d.
pub const VALIDATION_LABELS: &str = "ImageID,Source,LabelName,Confidence\n\
    000a,verification,/m/01yrx,1\n\
    000a,verification,/m/015p6,1\n\
    000b,verification,/m/0bt9lr,1\n\
    000c,verification,/m/015p6,1\n\
    000d,verification,/m/01yrx,0\n\
    000e,verification,/m/0bt9lr,1\n\
    000e,verification,/m/01yrx,1\n";

pub const VALIDATION_BOXES: &str = "ImageID,Source,LabelName,Confidence,XMin,XMax,YMin,YMax,IsOccluded,IsTruncated,IsGroupOf,IsDepiction,IsInside\n\
    000a,xclick,/m/01yrx,1,0.1,0.5,0.2,0.6,0,0,0,0,0\n\
    000f,xclick,/m/015p6,1,0.0,1.0,0.0,1.0,0,1,0,0,0\n";

/// Minimal JPEG header served for every media request
pub const JPEG_BYTES: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46, 0x49, 0x46];

pub struct MockMirror {
    pub server: ServerGuard,
    pub classes: Mock,
    pub labels: Mock,
    pub boxes: Mock,
    pub media: Mock,
}

impl MockMirror {
    /// Mirror serving class descriptions, validation labels, boxes and media
    pub async fn start() -> Self {
        let mut server = mockito::Server::new_async().await;

        let classes = server
            .mock("GET", CLASSES_PATH)
            .with_status(200)
            .with_body(CLASSES)
            .create_async()
            .await;
        let labels = server
            .mock("GET", VALIDATION_LABELS_PATH)
            .with_status(200)
            .with_body(VALIDATION_LABELS)
            .create_async()
            .await;
        let boxes = server
            .mock("GET", VALIDATION_BOXES_PATH)
            .with_status(200)
            .with_body(VALIDATION_BOXES)
            .create_async()
            .await;
        let media = server
            .mock("GET", Matcher::Regex(r"^/validation/[0-9a-f]+\.jpg$".to_string()))
            .with_status(200)
            .with_body(JPEG_BYTES)
            .create_async()
            .await;

        Self {
            server,
            classes,
            labels,
            boxes,
            media,
        }
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Loader whose Open Images entry points at this mirror
    pub fn loader(&self, cache_dir: &Path) -> ZooLoader {
        ZooLoader::with_cache_dir(cache_dir)
            .unwrap()
            .with_dataset(Box::new(OpenImagesV7::with_mirrors(self.url(), self.url())))
    }
}
