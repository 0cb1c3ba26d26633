use dashfeed::models::{DateRange, Entry, Meta, NormalizedRow, NormalizedTable, RawTable, Scalar};
use dashfeed::{ModelError, RequestPayload, SeriesRequest};

#[test]
fn date_range_accepts_only_explicit_pairs() {
    let r: DateRange = "2000:2023".parse().unwrap();
    assert_eq!(r, DateRange { start: 2000, end: 2023 });
    assert_eq!(r.to_query_param(), "2000:2023");
    assert!(r.contains(2010));
    assert!(!r.contains(2024));

    for bad in ["2020", "2000:", ":2020", "2020:2000", "a:b", ""] {
        assert!(
            matches!(bad.parse::<DateRange>(), Err(ModelError::InvalidRange { .. })),
            "accepted {bad:?}"
        );
    }
}

#[test]
fn series_request_validates_uniqueness() {
    assert!(SeriesRequest::new([("A", "x"), ("A", "y")]).is_err());
    assert!(SeriesRequest::new([("A", "x"), ("B", "x")]).is_err());
    assert!(SeriesRequest::new(Vec::<(String, String)>::new()).is_err());

    let s = SeriesRequest::parse_pairs(&["GDP=NY.GDP.MKTP.CD", "Pop = SP.POP.TOTL"]).unwrap();
    assert_eq!(s.names(), vec!["GDP", "Pop"]);
    assert_eq!(s.codes(), vec!["NY.GDP.MKTP.CD", "SP.POP.TOTL"]);
    assert_eq!(s.name_for("SP.POP.TOTL"), Some("Pop"));
    assert!(SeriesRequest::parse_pairs(&["no-separator"]).is_err());
}

#[test]
fn payload_body_shape() {
    let body = RequestPayload::new("be terse", "text").to_body();
    assert_eq!(
        body,
        serde_json::json!({
            "systemInstruction": {"parts": [{"text": "be terse"}]},
            "contents": [{"parts": [{"text": "text"}]}]
        })
    );
}

#[test]
fn raw_table_from_records_unions_columns() {
    let t = RawTable::from_json_records(r#"[{"e":"IND","t":"YR2000","a":1},{"e":"IND","t":"YR2001","b":"x"}]"#)
        .unwrap();
    assert_eq!(t.columns, vec!["e", "t", "a", "b"]);
    assert_eq!(t.rows[0][3], Scalar::Null);
    assert_eq!(t.rows[1][2], Scalar::Null);
    assert_eq!(t.rows[1][3], Scalar::Text("x".into()));
}

#[test]
fn raw_table_from_records_keeps_non_scalar_cells_as_text() {
    let t = RawTable::from_json_records(r#"[{"e":"IND","ok":true,"m":{"k":1},"l":[1],"n":2.5}]"#)
        .unwrap();
    assert_eq!(
        t.rows[0],
        vec![
            Scalar::from("IND"),
            Scalar::from("true"),
            Scalar::from(r#"{"k":1}"#),
            Scalar::from("[1]"),
            Scalar::Number(2.5),
        ]
    );
    assert!(RawTable::from_json_records(r#"{"e":"IND"}"#).is_err());
}

#[test]
fn normalized_records_use_series_names() {
    let t = NormalizedTable {
        series: vec!["GDP".into()],
        rows: vec![NormalizedRow {
            entity: "IND".into(),
            year: 2000,
            values: vec![None],
        }],
    };
    let recs = t.to_records();
    assert_eq!(
        serde_json::Value::Object(recs[0].clone()),
        serde_json::json!({"entity": "IND", "year": 2000, "GDP": null})
    );
}

#[test]
fn meta_accepts_string_or_number_per_page() {
    let a: Meta = serde_json::from_str(r#"{"page":1,"pages":2,"per_page":"50","total":60}"#).unwrap();
    let b: Meta = serde_json::from_str(r#"{"page":1,"pages":2,"per_page":50,"total":60}"#).unwrap();
    assert_eq!(a.per_page, 50);
    assert_eq!(b.per_page, 50);
}

#[test]
fn entry_entity_falls_back_to_country_id() {
    let e: Entry = serde_json::from_str(
        r#"{"indicator":{"id":"X","value":"X"},"country":{"id":"EUU","value":"EU"},"countryiso3code":"","date":"2020","value":null}"#,
    )
    .unwrap();
    assert_eq!(e.entity(), "EUU");
}
