use std::io::Write;

use anyhow::Result;
use image::{GrayImage, Luma};

use haarwatch::cascade::{group_rectangles, GROUP_EPS};
use haarwatch::{CascadeClassifier, Classifier, Detection, GrayFrame, HaarCascade, ScanParams};

/// 4x4 window with one stump on the whole-window sum: passes when the sum >= 1000.
const CURRENT_LAYOUT: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade>
  <stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>4</height>
  <width>4</width>
  <stageParams>
    <boostType>GAB</boostType>
    <minHitRate>9.9500000476837158e-01</minHitRate>
    <maxFalseAlarm>5.0000000000000000e-01</maxFalseAlarm>
    <weightTrimRate>9.4999999999999996e-01</weightTrimRate>
    <maxDepth>1</maxDepth>
    <maxWeakCount>100</maxWeakCount></stageParams>
  <featureParams>
    <maxCatCount>0</maxCatCount>
    <featSize>1</featSize>
    <mode>BASIC</mode></featureParams>
  <stageNum>1</stageNum>
  <stages>
    <!-- stage 0 -->
    <_>
      <maxWeakCount>1</maxWeakCount>
      <stageThreshold>0.</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>
            0 -1 0 1000.</internalNodes>
          <leafValues>
            -1. 1.</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>
          0 0 4 4 1.</_></rects></_></features></cascade>
</opencv_storage>
"#;

/// The same classifier in the `opencv_haartraining` layout.
const LEGACY_LAYOUT: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<bright_block type_id="opencv-haar-classifier">
  <size>4 4</size>
  <stages>
    <_>
      <!-- stage 0 -->
      <trees>
        <_>
          <!-- tree 0 -->
          <_>
            <!-- root node -->
            <feature>
              <rects>
                <_>0 0 4 4 1.</_></rects>
              <tilted>0</tilted></feature>
            <threshold>1000.</threshold>
            <left_val>-1.</left_val>
            <right_val>1.</right_val></_></_></trees>
      <stage_threshold>0.</stage_threshold>
      <parent>-1</parent>
      <next>-1</next></_></stages></bright_block>
</opencv_storage>
"#;

/// 6x6 window with a single 45° rotated rect.
const TILTED_LAYOUT: &str = r#"<?xml version="1.0"?>
<opencv_storage>
<cascade>
  <stageType>BOOST</stageType>
  <featureType>HAAR</featureType>
  <height>6</height>
  <width>6</width>
  <stages>
    <_>
      <stageThreshold>0.</stageThreshold>
      <weakClassifiers>
        <_>
          <internalNodes>0 -1 0 100.</internalNodes>
          <leafValues>-1. 1.</leafValues></_></weakClassifiers></_></stages>
  <features>
    <_>
      <rects>
        <_>3 0 2 2 1.</_></rects>
      <tilted>1</tilted></_></features></cascade>
</opencv_storage>
"#;

/// 4x8 frame: dark top half, bright bottom half.
fn half_bright() -> GrayImage {
    GrayImage::from_fn(4, 8, |_, y| Luma([if y >= 4 { 200 } else { 0 }]))
}

fn raw_hits() -> ScanParams {
    ScanParams {
        scale_factor: 2.0,
        min_neighbors: 0,
        ..ScanParams::default()
    }
}

/// Single-node stumps over a 4x4 window: `(feature, threshold)` per stage, leaves -1/1.
fn stump_cascade(stages: &[(usize, f64)], rects: &[&str]) -> String {
    let stages: String = stages
        .iter()
        .map(|(feature, threshold)| {
            format!(
                "<_><stageThreshold>0.</stageThreshold><weakClassifiers><_>\
                 <internalNodes>0 -1 {} {}</internalNodes>\
                 <leafValues>-1. 1.</leafValues></_></weakClassifiers></_>",
                feature, threshold
            )
        })
        .collect();
    let features: String = rects
        .iter()
        .map(|rect| format!("<_><rects><_>{}</_></rects></_>", rect))
        .collect();
    format!(
        "<?xml version=\"1.0\"?>\n<opencv_storage><cascade>\
         <stageType>BOOST</stageType><featureType>HAAR</featureType>\
         <height>4</height><width>4</width>\
         <stages>{}</stages><features>{}</features></cascade></opencv_storage>\n",
        stages, features
    )
}

fn xs(hits: &[Detection]) -> Vec<i32> {
    hits.iter().map(|d| d.x).collect()
}

fn write_temp(suffix: &str, content: &str) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("bright_block")
        .suffix(suffix)
        .tempfile()?;
    file.write_all(content.as_bytes())?;
    file.flush()?;
    Ok(file)
}

#[test]
fn current_layout_loads_from_disk() -> Result<()> {
    let file = write_temp(".xml", CURRENT_LAYOUT)?;
    let classifier = CascadeClassifier::load(file.path(), raw_hits())?;

    assert!(classifier.name().starts_with("bright_block"));
    assert_eq!(classifier.cascade().window_size(), (4, 4));
    assert_eq!(classifier.cascade().stage_count(), 1);

    let detections = classifier.detect(&GrayFrame::new(half_bright(), 0));
    assert_eq!(detections, vec![Detection::new(0, 4, 4, 4)]);
    Ok(())
}

#[test]
fn legacy_layout_matches_current_layout() -> Result<()> {
    let current = HaarCascade::from_xml(CURRENT_LAYOUT)?;
    let legacy = HaarCascade::from_xml(LEGACY_LAYOUT)?;

    assert_eq!(legacy.window_size(), current.window_size());
    assert_eq!(legacy.stage_count(), current.stage_count());
    assert_eq!(legacy.feature_count(), current.feature_count());

    let image = half_bright();
    assert_eq!(
        legacy.detect_multi_scale(&image, &raw_hits()),
        current.detect_multi_scale(&image, &raw_hits())
    );
    Ok(())
}

#[test]
fn tilted_features_are_evaluated() -> Result<()> {
    let cascade = HaarCascade::from_xml(TILTED_LAYOUT)?;
    assert_eq!(cascade.window_size(), (6, 6));

    let dark = GrayImage::new(6, 6);
    assert!(cascade.detect_multi_scale(&dark, &raw_hits()).is_empty());

    let bright = GrayImage::from_pixel(6, 6, Luma([255]));
    assert_eq!(
        cascade.detect_multi_scale(&bright, &raw_hits()),
        vec![Detection::new(0, 0, 6, 6)]
    );
    Ok(())
}

#[test]
fn malformed_documents_are_rejected() {
    assert!(HaarCascade::from_xml("").is_err());
    assert!(HaarCascade::from_xml("<opencv_storage><cascade>").is_err());
    assert!(HaarCascade::from_xml("<something_else/>").is_err());

    let truncated = CURRENT_LAYOUT.replace("0 -1 0 1000.", "0 -1 0");
    assert!(HaarCascade::from_xml(&truncated).is_err());

    let dangling = CURRENT_LAYOUT.replace("0 -1 0 1000.", "0 -1 7 1000.");
    let err = HaarCascade::from_xml(&dangling).expect_err("missing feature");
    assert!(err.to_string().contains("missing feature"));

    let outside = CURRENT_LAYOUT.replace("0 0 4 4 1.", "2 0 4 4 1.");
    assert!(HaarCascade::from_xml(&outside).is_err());

    // Node 1 branches back to itself; evaluating it would never reach a leaf.
    let cyclic = CURRENT_LAYOUT.replace("0 -1 0 1000.", "1 0 0 1000. 1 -1 0 1000.");
    let err = HaarCascade::from_xml(&cyclic).expect_err("cyclic tree");
    assert!(err.to_string().contains("invalid tree branch"));

    let missing_leaf = CURRENT_LAYOUT.replace("0 -1 0 1000.", "0 -2 0 1000.");
    assert!(HaarCascade::from_xml(&missing_leaf).is_err());
}

#[test]
fn forward_trees_of_depth_two_are_accepted() -> Result<()> {
    // Root splits on the window sum; node 1 decides the bright branch.
    let deeper = CURRENT_LAYOUT
        .replace("0 -1 0 1000.", "0 1 0 1000. -1 -2 0 2000.")
        .replace("-1. 1.</leafValues>", "-1. -1. 1.</leafValues>");
    let cascade = HaarCascade::from_xml(&deeper)?;
    assert_eq!(
        cascade.detect_multi_scale(&half_bright(), &raw_hits()),
        vec![Detection::new(0, 4, 4, 4)]
    );
    Ok(())
}

#[test]
fn non_haar_cascades_are_rejected() {
    let lbp = CURRENT_LAYOUT.replace("<featureType>HAAR</featureType>", "<featureType>LBP</featureType>");
    let err = HaarCascade::from_xml(&lbp).expect_err("LBP is unsupported");
    assert!(format!("{:#}", err).contains("LBP"));
}

#[test]
fn missing_cascade_file_names_the_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("car_detector.xml");
    let err = CascadeClassifier::load(&path, ScanParams::default()).expect_err("no file");
    assert!(format!("{:#}", err).contains("car_detector.xml"));
}

#[test]
fn invalid_scan_params_are_rejected_at_construction() -> Result<()> {
    let cascade = HaarCascade::from_xml(CURRENT_LAYOUT)?;
    let params = ScanParams {
        scale_factor: f64::NAN,
        ..ScanParams::default()
    };
    assert!(CascadeClassifier::new(cascade, params).is_err());
    Ok(())
}

#[test]
fn min_size_skips_small_windows() -> Result<()> {
    let cascade = HaarCascade::from_xml(CURRENT_LAYOUT)?;
    let params = ScanParams {
        min_size: Some((5, 5)),
        ..raw_hits()
    };
    assert!(cascade.detect_multi_scale(&half_bright(), &params).is_empty());
    Ok(())
}

#[test]
fn small_scales_step_two_pixels_and_large_scales_one() -> Result<()> {
    let accept_all = HaarCascade::from_xml(&stump_cascade(&[(0, -1e6)], &["0 0 4 4 1."]))?;
    let params = ScanParams {
        scale_factor: 2.5,
        min_neighbors: 0,
        ..ScanParams::default()
    };
    let hits = accept_all.detect_multi_scale(&GrayImage::from_pixel(20, 10, Luma([90])), &params);

    // Factor 1: a 17x7 range of origins walked on the even grid.
    let base: Vec<_> = hits.iter().filter(|d| d.width == 4).collect();
    assert_eq!(base.len(), 9 * 4);
    assert!(base.iter().all(|d| d.x % 2 == 0 && d.y % 2 == 0 && d.height == 4));

    // Factor 2.5: every origin of the 8x4 level, mapped back with ties to even.
    let scaled: Vec<_> = hits.iter().filter(|d| d.width == 10).copied().collect();
    assert_eq!(xs(&scaled), vec![0, 2, 5, 8, 10]);
    assert!(scaled.iter().all(|d| d.y == 0 && d.height == 10));

    assert_eq!(hits.len(), base.len() + scaled.len());
    Ok(())
}

#[test]
fn first_stage_rejection_skips_the_next_window() -> Result<()> {
    // Column 0 dark, the rest bright: the window at x = 0 fails the column test.
    let image = GrayImage::from_fn(10, 4, |x, _| Luma([if x == 0 { 0 } else { 200 }]));
    let params = ScanParams {
        scale_factor: 3.0,
        min_neighbors: 0,
        ..ScanParams::default()
    };
    let column = "0 0 1 4 1.";
    let whole = "0 0 4 4 1.";

    let single = HaarCascade::from_xml(&stump_cascade(&[(0, 100.0)], &[column]))?;
    assert_eq!(xs(&single.detect_multi_scale(&image, &params)), vec![4, 6]);

    // Rejected by a later stage: only the regular step applies.
    let staged =
        HaarCascade::from_xml(&stump_cascade(&[(1, -1e6), (0, 100.0)], &[column, whole]))?;
    assert_eq!(xs(&staged.detect_multi_scale(&image, &params)), vec![2, 4, 6]);
    Ok(())
}

#[test]
fn grouping_merges_neighbors_and_drops_stragglers() {
    let hits = vec![
        Detection::new(40, 40, 24, 24),
        Detection::new(42, 40, 24, 24),
        Detection::new(40, 42, 24, 24),
        Detection::new(42, 42, 24, 24),
        Detection::new(200, 10, 24, 24),
    ];

    let grouped = group_rectangles(hits.clone(), 3, GROUP_EPS);
    assert_eq!(grouped, vec![Detection::new(41, 41, 24, 24)]);

    assert!(group_rectangles(hits, 4, GROUP_EPS).is_empty());
}
