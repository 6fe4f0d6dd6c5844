mod common;

use std::io::Write;

use camino::Utf8Path;
use common::{assert_phot_stat_close, assert_valid, random_light_curve, recompute};
use photstat::engine::InMemoryPhotometry;
use photstat::photometry::photometry_file::PhotometryFile;
use photstat::{
    ObjectId, PhotStatEngine, PhotStatError, PhotStatParams, PhotStatStore, PhotometryPoint,
    PhotometrySet, RecomputeFilter,
};

fn source_with(objects: &[(&str, f64, u64)]) -> InMemoryPhotometry {
    let mut source = InMemoryPhotometry::new();
    for (obj_id, created_at, seed) in objects {
        source.insert(
            ObjectId::from(*obj_id),
            *created_at,
            random_light_curve(*seed, 25).into_iter().collect(),
        );
    }
    source
}

#[test]
fn test_concurrent_inserts_on_one_object() {
    let params = PhotStatParams::default();
    let engine = PhotStatEngine::in_memory(params.clone());
    let obj = ObjectId::from("ZTF24shared");

    let points: Vec<PhotometryPoint> = (0..200)
        .map(|i| {
            PhotometryPoint::new(
                if i % 2 == 0 { "ztfg" } else { "ztfr" },
                59000.0 + i as f64,
                Some(50.0 + i as f64 * 1.5),
                Some(2.0),
            )
        })
        .collect();

    std::thread::scope(|scope| {
        for chunk in points.chunks(25) {
            let engine = &engine;
            let obj = &obj;
            scope.spawn(move || {
                for point in chunk {
                    engine.on_point_inserted(obj, point).unwrap();
                }
            });
        }
    });

    let stat = engine.get_phot_stat(&obj).unwrap();
    assert_eq!(stat.num_obs_global, 200);
    assert_eq!(stat.num_det_global, 200);
    assert_valid(&stat);
    assert_phot_stat_close(&stat, &recompute("ZTF24shared", &points, &params), 1e-9);
}

#[test]
fn test_points_changed_after_deletion() {
    let params = PhotStatParams::default();
    let engine = PhotStatEngine::in_memory(params.clone());
    let obj = ObjectId::from("ZTF1");
    let mut points = random_light_curve(9, 20);

    for point in points.iter() {
        engine.on_point_inserted(&obj, point).unwrap();
    }
    points.remove(4);
    let rebuilt = engine.on_points_changed(&obj, &points).unwrap();

    assert_eq!(rebuilt.num_obs_global, 19);
    assert!(rebuilt.last_full_update.is_some());
    assert_phot_stat_close(&rebuilt, &recompute("ZTF1", &points, &params), 0.0);
    assert_eq!(engine.get_phot_stat(&obj).unwrap(), rebuilt);
}

#[test]
fn test_recompute_missing_and_all() {
    let engine = PhotStatEngine::in_memory(PhotStatParams::default());
    let source = source_with(&[("a", 59000.0, 1), ("b", 59010.0, 2), ("c", 59020.0, 3)]);

    engine
        .on_point_inserted(
            &"b".into(),
            &PhotometryPoint::new("ztfg", 59000.0, Some(100.0), Some(1.0)),
        )
        .unwrap();

    let written = engine
        .recompute_missing(&source, &RecomputeFilter::default())
        .unwrap();
    assert_eq!(written, 2);
    // the existing record of b was left alone
    assert_eq!(engine.get_phot_stat(&"b".into()).unwrap().num_obs_global, 1);
    assert_eq!(engine.get_phot_stat(&"a".into()).unwrap().num_obs_global, 25);

    let written = engine
        .recompute_all(&source, &RecomputeFilter::default())
        .unwrap();
    assert_eq!(written, 3);
    assert_eq!(engine.get_phot_stat(&"b".into()).unwrap().num_obs_global, 25);
    assert_eq!(engine.store().object_ids().unwrap().len(), 3);
}

#[test]
fn test_recompute_filters() {
    let engine = PhotStatEngine::in_memory(PhotStatParams::default());
    let source = source_with(&[("a", 59000.0, 1), ("b", 59010.0, 2), ("c", 59020.0, 3)]);

    let created = RecomputeFilter {
        created_after: Some(59005.0),
        ..Default::default()
    };
    assert_eq!(engine.recompute_missing(&source, &created).unwrap(), 2);
    assert!(matches!(
        engine.get_phot_stat(&"a".into()),
        Err(PhotStatError::NotFound(_))
    ));

    let capped = RecomputeFilter {
        max_objects: Some(1),
        ..Default::default()
    };
    assert_eq!(engine.recompute_all(&source, &capped).unwrap(), 1);

    // objects without a record never satisfy an update bound
    let stale = RecomputeFilter {
        full_update_before: Some(f64::MAX),
        ..Default::default()
    };
    let untouched = PhotStatEngine::in_memory(PhotStatParams::default());
    assert_eq!(untouched.recompute_all(&source, &stale).unwrap(), 0);
    assert_eq!(engine.recompute_all(&source, &stale).unwrap(), 3);

    let future = RecomputeFilter {
        quick_update_after: Some(f64::MAX),
        ..Default::default()
    };
    assert_eq!(engine.recompute_all(&source, &future).unwrap(), 0);
}

#[test]
fn test_engine_over_csv_file() {
    let params = PhotStatParams::builder()
        .detection_threshold(5.0)
        .build()
        .unwrap();

    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "obj_id,mjd,filter,flux,fluxerr,zp,limiting_mag").unwrap();
    writeln!(file, "ZTF1,59000.0,ztfg,4.0,1.0,,20.0").unwrap();
    writeln!(file, "ZTF1,59001.0,ztfg,100.0,1.0,,").unwrap();
    writeln!(file, "ZTF1,59002.0,ztfr,100.0,1.0,25.0,").unwrap();
    writeln!(file, "ZTF2,59000.5,ztfr,,2.0,,").unwrap();
    file.flush().unwrap();

    let path = Utf8Path::from_path(file.path()).unwrap();
    let set = PhotometrySet::new_from_csv(path, &params).unwrap();
    assert_eq!(set.len(), 2);

    let engine = PhotStatEngine::in_memory(params);
    let source = InMemoryPhotometry::from_set(set, 58999.0);
    assert_eq!(
        engine
            .recompute_missing(&source, &RecomputeFilter::default())
            .unwrap(),
        2
    );

    let ztf1 = engine.get_phot_stat(&"ZTF1".into()).unwrap();
    assert_eq!(ztf1.num_obs_global, 3);
    // snr 4 is below the threshold of 5
    assert_eq!(ztf1.num_det_global, 2);
    assert_eq!(ztf1.predetection_mjds, vec![59000.0]);
    assert_eq!(ztf1.deepest_limit_global, Some(20.0));
    assert!(ztf1.mean_color.contains_key("ztfg-ztfr"));

    let ztf2 = engine.get_phot_stat(&"ZTF2".into()).unwrap();
    assert_eq!(ztf2.num_det_global, 0);
    assert!(ztf2.deepest_limit_global.is_some());
}
