use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

const QUAD_OBJ: &str = "mtllib quad.mtl
o Quad
v -0.5 -0.5 0
v 0.5 -0.5 0
v 0.5 0.5 0
v -0.5 0.5 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl painted
f 1/1/1 2/2/1 3/3/1 4/4/1
";

const QUAD_MTL: &str = "newmtl painted
map_Kd textures/paint.png
map_Ks textures/paint.png
";

fn write_assets(dir: &Path) {
    fs::write(dir.join("quad.obj"), QUAD_OBJ).expect("write obj");
    fs::write(dir.join("quad.mtl"), QUAD_MTL).expect("write mtl");
    fs::create_dir(dir.join("textures")).expect("texture dir");
    image::RgbImage::from_pixel(2, 2, image::Rgb([200, 40, 40]))
        .save(dir.join("textures/paint.png"))
        .expect("write png");
}

fn scene_dir() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    write_assets(dir.path());
    let scene = r#"<scene>
  <camera><position>0 0 4</position></camera>
  <model><path>quad.obj</path><shininess>32</shininess></model>
  <instance><position>0 0 0</position></instance>
  <instance><position>2 0 0</position><rotation>0 45 0</rotation></instance>
  <light>
    <position>1 1 2</position>
    <attenuation>1 0.09 0.032</attenuation>
    <color>1 1 1</color>
  </light>
</scene>
"#;
    fs::write(dir.path().join("scene.xml"), scene).expect("write scene");
    dir
}

fn viewer() -> Command {
    Command::cargo_bin("lumen-viewer").expect("binary exists")
}

#[test]
fn summary_reports_model_textures_and_uniforms() {
    let dir = scene_dir();
    let mut cmd = viewer();
    cmd.arg(dir.path().join("scene.xml")).arg("--summary-only");
    cmd.assert()
        .success()
        .stdout(contains("Meshes: 1"))
        .stdout(contains("Vertices: 4"))
        .stdout(contains("Indices: 6"))
        .stdout(contains("Textures: 1 (hits 1, misses 1, failed 0)"))
        .stdout(contains(
            "textures [material.texture_diffuse1, material.texture_specular1]",
        ))
        .stdout(contains("Lights: 1"))
        .stdout(contains("Instances: 2"))
        .stdout(contains("  viewer_pos"))
        .stdout(contains("  material.shininess"))
        .stdout(contains("  plight[0].attenuation"))
        .stdout(contains("  current_lights_num"))
        .stdout(contains("  projection"))
        .stdout(contains("  view"))
        .stdout(contains("  model"));
}

#[test]
fn model_flag_overrides_default_scene() {
    let dir = tempfile::tempdir().expect("temp dir");
    write_assets(dir.path());
    let mut cmd = viewer();
    cmd.arg("--summary-only")
        .arg("--model")
        .arg(dir.path().join("quad.obj"));
    cmd.assert()
        .success()
        .stdout(contains("Meshes: 1"))
        .stdout(contains("Lights: 2"))
        .stdout(contains("Instances: 3"))
        .stdout(contains("  plight[1].diffuse"));
}

#[test]
fn missing_model_still_runs_with_empty_summary() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut cmd = viewer();
    cmd.arg("--summary-only")
        .arg("--model")
        .arg(dir.path().join("absent.obj"));
    cmd.assert()
        .success()
        .stdout(contains("Meshes: 0"))
        .stdout(contains("Textures: 0"))
        .stdout(contains("  model"));
}

#[test]
fn missing_texture_is_skipped() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("quad.obj"), QUAD_OBJ).expect("write obj");
    fs::write(dir.path().join("quad.mtl"), QUAD_MTL).expect("write mtl");
    let mut cmd = viewer();
    cmd.arg("--summary-only")
        .arg("--model")
        .arg(dir.path().join("quad.obj"));
    cmd.assert()
        .success()
        .stdout(contains("Meshes: 1"))
        .stdout(contains("failed 1"))
        .stdout(contains("textures []"));
}

#[test]
fn invalid_scene_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("scene.xml");
    fs::write(&path, "<scene><camera/></scene>").expect("write scene");
    let mut cmd = viewer();
    cmd.arg(&path).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("failed to load scene"));
}

#[test]
fn unknown_flag_is_rejected() {
    let mut cmd = viewer();
    cmd.arg("--frobnicate");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --frobnicate"))
        .stdout(predicate::str::is_empty());
}
