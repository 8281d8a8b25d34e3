//! End-to-end tests for `stagehand build` using asset components, so the only
//! external tools involved are `mkdir` and `cp`.

use predicates::prelude::*;

use super::common::{TestEnv, asset_component, mock_asset};

#[test]
fn build_installs_assets_and_marks_complete() {
  let mut server = mockito::Server::new();
  let mock = mock_asset(&mut server, "fonts", "1.0");
  let env = TestEnv::new();
  env.write_manifest(&asset_component(&server, "fonts", "1.0"));

  env
    .stagehand_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("fonts built"))
    .stdout(predicate::str::contains("Reruns are incremental"));

  let root = env.root_path();
  assert!(root.join("staging/fonts/usr/local/share/fonts/fonts.dat").exists());
  assert!(root.join("markers/built_fonts").exists());
  assert!(root.join("logs/fonts.log").exists());
  mock.assert();
}

#[test]
fn no_command_means_build() {
  let mut server = mockito::Server::new();
  let _mock = mock_asset(&mut server, "icons", "3.1");
  let env = TestEnv::new();
  env.write_manifest(&asset_component(&server, "icons", "3.1"));

  env.stagehand_cmd().assert().success();

  assert!(env.root_path().join("markers/built_icons").exists());
}

#[test]
fn rerun_skips_completed_components() {
  let mut server = mockito::Server::new();
  let mock = mock_asset(&mut server, "fonts", "1.0").expect(1);
  let env = TestEnv::new();
  env.write_manifest(&asset_component(&server, "fonts", "1.0"));

  env.stagehand_cmd().arg("build").assert().success();
  env
    .stagehand_cmd()
    .arg("build")
    .assert()
    .success()
    .stdout(predicate::str::contains("fonts already built, skipping"));

  mock.assert();
}

#[test]
fn component_failure_is_reported_but_run_succeeds() {
  let mut server = mockito::Server::new();
  let _good = mock_asset(&mut server, "good", "1.0");
  let _missing = server.mock("GET", "/gone-1.0.tar.gz").with_status(404).create();
  let env = TestEnv::new();
  env.write_manifest(&format!(
    "{}{}",
    asset_component(&server, "gone", "1.0"),
    asset_component(&server, "good", "1.0")
  ));

  env
    .stagehand_cmd()
    .arg("build")
    .assert()
    .success()
    .stderr(predicate::str::contains("gone failed"))
    .stdout(predicate::str::contains("good built"))
    .stdout(predicate::str::contains("Needs attention: gone"));

  let root = env.root_path();
  assert!(!root.join("markers/built_gone").exists());
  assert!(root.join("markers/built_good").exists());
}

#[test]
fn missing_host_env_aborts_before_any_component() {
  let mut server = mockito::Server::new();
  let mock = mock_asset(&mut server, "fonts", "1.0").expect(0);
  let env = TestEnv::new();
  env.write_manifest(&format!(
    "[host]\nenv = [\"STAGEHAND_TEST_REQUIRED\"]\n{}",
    asset_component(&server, "fonts", "1.0")
  ));

  env
    .stagehand_cmd()
    .env_remove("STAGEHAND_TEST_REQUIRED")
    .arg("build")
    .assert()
    .failure()
    .stderr(predicate::str::contains("STAGEHAND_TEST_REQUIRED"));

  assert!(!env.root_path().join("markers/built_fonts").exists());
  mock.assert();
}

#[test]
fn host_env_present_lets_build_run() {
  let mut server = mockito::Server::new();
  let _mock = mock_asset(&mut server, "fonts", "1.0");
  let env = TestEnv::new();
  env.write_manifest(&format!(
    "[host]\nenv = [\"STAGEHAND_TEST_REQUIRED\"]\n{}",
    asset_component(&server, "fonts", "1.0")
  ));

  env
    .stagehand_cmd()
    .env("STAGEHAND_TEST_REQUIRED", "1")
    .arg("build")
    .assert()
    .success();

  assert!(env.root_path().join("markers/built_fonts").exists());
}

#[test]
fn root_flag_overrides_manifest_root() {
  let mut server = mockito::Server::new();
  let _mock = mock_asset(&mut server, "fonts", "1.0");
  let env = TestEnv::new();
  env.write_manifest(&asset_component(&server, "fonts", "1.0"));
  let elsewhere = env.temp.path().join("elsewhere");

  env
    .stagehand_cmd()
    .arg("--root")
    .arg(&elsewhere)
    .arg("build")
    .assert()
    .success();

  assert!(elsewhere.join("markers/built_fonts").exists());
  assert!(!env.root_path().exists());
}

#[test]
fn dependency_cycle_is_fatal_with_enforcement() {
  let server = mockito::Server::new();
  let env = TestEnv::new();
  let a = asset_component(&server, "a", "1.0").replace("strategy = \"copy\"", "strategy = \"copy\"\ndepends = [\"b\"]");
  let b = asset_component(&server, "b", "1.0").replace("strategy = \"copy\"", "strategy = \"copy\"\ndepends = [\"a\"]");
  env.write_manifest(&format!("{a}{b}"));

  env
    .stagehand_cmd()
    .arg("build")
    .arg("--enforce-deps")
    .assert()
    .failure()
    .stderr(predicate::str::contains("cycle"));
}
