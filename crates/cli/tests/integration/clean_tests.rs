use predicates::prelude::*;

use super::common::{TestEnv, asset_component, mock_asset};

#[test]
fn clean_removes_root_and_forces_rebuild() {
  let mut server = mockito::Server::new();
  let mock = mock_asset(&mut server, "fonts", "1.0").expect(2);
  let env = TestEnv::new();
  env.write_manifest(&asset_component(&server, "fonts", "1.0"));

  env.stagehand_cmd().arg("build").assert().success();
  assert!(env.root_path().exists());

  env
    .stagehand_cmd()
    .arg("clean")
    .assert()
    .success()
    .stdout(predicate::str::contains("Removed"));
  assert!(!env.temp.path().join("build").exists());

  env
    .stagehand_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("fonts built"));
  mock.assert();
}

#[test]
fn clean_leaves_sysroot_alone() {
  let env = TestEnv::new();
  env.write_manifest("");
  std::fs::create_dir_all(env.temp.path().join("build/logs")).unwrap();
  std::fs::write(env.sysroot_path().join("keep"), "x").unwrap();

  env.stagehand_cmd().arg("clean").assert().success();

  assert!(!env.temp.path().join("build").exists());
  assert!(env.sysroot_path().join("keep").exists());
}
