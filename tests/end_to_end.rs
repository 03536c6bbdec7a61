//! Facade-level scenarios against real temp directories and real image
//! encoding: the path a host application actually exercises.

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use recrop::{Config, Cropper, CropOption, FilterKind, HandleError, Served};
use std::fs;
use std::io::Cursor;
use tempfile::TempDir;

struct Site {
    _tmp: TempDir,
    cropper: Cropper,
    crops_dir: std::path::PathBuf,
}

fn site(max_crops: Option<usize>) -> Site {
    let tmp = TempDir::new().unwrap();
    let src_dir = tmp.path().join("uploads");
    let crops_dir = tmp.path().join("crops");
    fs::create_dir_all(&src_dir).unwrap();
    fs::create_dir_all(&crops_dir).unwrap();

    let png = {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([90, 140, 200])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    };
    fs::write(src_dir.join("photo.png"), &png).unwrap();

    let config = Config {
        src_dir: src_dir.to_string_lossy().into_owned(),
        crops_dir: crops_dir.to_string_lossy().into_owned(),
        max_crops,
        ..Config::default()
    };
    Site {
        _tmp: tmp,
        cropper: Cropper::new(&config),
        crops_dir,
    }
}

#[test]
fn first_request_generates_then_second_hits_the_cache() {
    let site = site(None);
    let url = site.cropper.url("photo.png", Some(16), Some(16), &[]).unwrap();
    assert_eq!(url, "/photo-16x16.png");

    let served = site.cropper.render(&url).unwrap();
    let Served::Fresh { path, bytes } = &served else {
        panic!("expected a freshly generated crop, got {served:?}");
    };
    assert_eq!(path, "photo-16x16.png");

    let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (16, 16));
    assert!(site.crops_dir.join("photo-16x16.png").is_file());

    // crops on local disk report as non-remote cache hits
    match site.cropper.render(&url).unwrap() {
        Served::Cached { path, remote } => {
            assert_eq!(path, "photo-16x16.png");
            assert!(!remote);
        }
        other => panic!("expected a cache hit, got {other:?}"),
    }
}

#[test]
fn filtered_crop_generates_through_the_full_pipeline() {
    let site = site(None);
    let url = site
        .cropper
        .url(
            "photo.png",
            Some(8),
            None,
            &[CropOption::Filter(FilterKind::BlackWhite)],
        )
        .unwrap();
    assert_eq!(url, "/photo-8x-bw.png");

    let Served::Fresh { bytes, .. } = site.cropper.render(&url).unwrap() else {
        panic!("expected fresh generation");
    };
    let img = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
        .unwrap()
        .to_rgb8();
    assert_eq!((img.width(), img.height()), (8, 4));
    let p = img.get_pixel(3, 2);
    assert_eq!(p[0], p[1]);
    assert_eq!(p[1], p[2]);
}

#[test]
fn unknown_source_and_non_crop_paths_are_refused() {
    let site = site(None);
    assert!(matches!(
        site.cropper.render("/ghost-16x16.png").unwrap_err(),
        HandleError::SourceNotFound(p) if p == "ghost.png"
    ));
    assert!(matches!(
        site.cropper.render("/photo.png").unwrap_err(),
        HandleError::NotACrop
    ));
}

#[test]
fn cap_refuses_new_variants_but_serves_existing_ones() {
    let site = site(Some(2));
    site.cropper.render("/photo-10x10.png").unwrap();
    site.cropper.render("/photo-20x20.png").unwrap();

    assert!(matches!(
        site.cropper.render("/photo-30x30.png").unwrap_err(),
        HandleError::TooManyCrops(_)
    ));
    assert!(matches!(
        site.cropper.render("/photo-10x10.png").unwrap(),
        Served::Cached { .. }
    ));
}

#[test]
fn reset_clears_crops_and_allows_regeneration() {
    let site = site(None);
    site.cropper.render("/photo-10x10.png").unwrap();

    let deleted = site.cropper.reset("photo.png").unwrap();
    assert_eq!(deleted, vec!["photo-10x10.png"]);
    assert!(!site.crops_dir.join("photo-10x10.png").exists());

    // source survived; the same crop can be generated again
    assert!(matches!(
        site.cropper.render("/photo-10x10.png").unwrap(),
        Served::Fresh { .. }
    ));
}

#[test]
fn delete_removes_source_and_crops() {
    let site = site(None);
    site.cropper.render("/photo-10x10.png").unwrap();

    let deleted = site.cropper.delete("photo.png").unwrap();
    assert_eq!(deleted, vec!["photo-10x10.png"]);
    assert!(matches!(
        site.cropper.render("/photo-10x10.png").unwrap_err(),
        HandleError::SourceNotFound(_)
    ));
}

#[test]
fn purge_dry_run_then_wet_run() {
    let site = site(None);
    site.cropper.render("/photo-10x10.png").unwrap();
    site.cropper.render("/photo-20x20.png").unwrap();

    let would = site.cropper.purge(Some("10x10"), true).unwrap();
    assert_eq!(would, vec!["photo-10x10.png"]);
    assert!(site.crops_dir.join("photo-10x10.png").exists());

    let deleted = site.cropper.purge(Some("10x10"), false).unwrap();
    assert_eq!(deleted, vec!["photo-10x10.png"]);
    assert!(!site.crops_dir.join("photo-10x10.png").exists());
    assert!(site.crops_dir.join("photo-20x20.png").exists());
}

#[test]
fn purge_skips_orphaned_crops() {
    let site = site(None);
    site.cropper.render("/photo-10x10.png").unwrap();
    // orphan: syntactically a crop, but its source never existed
    fs::write(site.crops_dir.join("old-50x50.jpg"), b"stale").unwrap();

    let deleted = site.cropper.purge(None, false).unwrap();
    assert_eq!(deleted, vec!["photo-10x10.png"]);
    assert!(site.crops_dir.join("old-50x50.jpg").exists());
}
