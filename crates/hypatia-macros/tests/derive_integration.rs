//! Integration tests for the derive macros.
//!
//! These tests verify that the generated code compiles against
//! `hypatia-core` and locates fields correctly.

use hypatia_core::{
    BindError, FieldKind, FieldPath, FieldValue, ParamTarget, Subject, WsParams,
};
use hypatia_macros::{ParamTarget, Subject};

#[derive(Debug, Default, Subject)]
struct Track {
    title: String,
    seconds: Option<i64>,
}

#[derive(Debug, Default, Subject, ParamTarget)]
struct Album {
    #[subject(rename = "Title")]
    title: String,
    year: i32,
    rating: Option<f32>,
    explicit: bool,
    #[subject(nested)]
    #[param(skip)]
    tracks: Vec<Track>,
    #[subject(skip)]
    #[param(skip)]
    cover: Vec<u8>,
    #[subject(skip)]
    tags: Vec<String>,
}

fn kind(path: &str) -> Option<FieldKind> {
    Album::field_kind(FieldPath::parse(path).expect("valid path").segments())
}

fn value<'a>(album: &'a Album, path: &str) -> FieldValue<'a> {
    album.field_value(FieldPath::parse(path).expect("valid path").segments())
}

#[test]
fn test_subject_kinds() {
    assert_eq!(kind("Title"), Some(FieldKind::String));
    assert_eq!(kind("year"), Some(FieldKind::Int32));
    assert_eq!(kind("rating"), Some(FieldKind::NilableFloat64));
    assert_eq!(kind("explicit"), Some(FieldKind::Bool));
    assert_eq!(kind("tracks[0].seconds"), Some(FieldKind::NilableInt64));
    assert_eq!(kind("title"), None);
    assert_eq!(kind("cover"), None);
    assert_eq!(kind("tags"), None);
    assert_eq!(kind("year.x"), None);
}

#[test]
fn test_subject_values() {
    let album = Album {
        title: "Blue".to_string(),
        year: 1971,
        rating: Some(4.5),
        tracks: vec![Track {
            title: "All I Want".to_string(),
            seconds: None,
        }],
        ..Album::default()
    };

    assert_eq!(value(&album, "Title"), FieldValue::Str("Blue"));
    assert_eq!(value(&album, "year"), FieldValue::Int(1971));
    assert_eq!(value(&album, "rating"), FieldValue::Float(4.5));
    assert_eq!(value(&album, "explicit"), FieldValue::Bool(false));
    assert_eq!(value(&album, "tracks[0].title"), FieldValue::Str("All I Want"));
    assert_eq!(value(&album, "tracks[0].seconds"), FieldValue::Absent);
    assert_eq!(value(&album, "tracks[3].title"), FieldValue::Absent);
}

#[test]
fn test_param_target_binds_by_name() {
    let params = WsParams::from_query("year=1971&explicit=true&tags=folk&tags=pop")
        .expect("valid query");
    let mut album = Album::default();

    album.bind_field("year", &params, "year").expect("binds year");
    album
        .bind_field("explicit", &params, "explicit")
        .expect("binds explicit");
    album.bind_field("tags", &params, "tags").expect("binds tags");

    assert_eq!(album.year, 1971);
    assert!(album.explicit);
    assert_eq!(album.tags, vec!["folk".to_string(), "pop".to_string()]);
}

#[test]
fn test_param_target_fields() {
    assert_eq!(
        Album::param_fields(),
        &["title", "year", "rating", "explicit", "tags"]
    );
}

#[test]
fn test_param_target_unknown_field() {
    let params = WsParams::from_query("x=1").expect("valid query");
    let mut album = Album::default();
    assert_eq!(
        album.bind_field("tracks", &params, "x"),
        Err(BindError::NoSuchField("tracks".to_string()))
    );
}
