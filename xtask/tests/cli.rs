use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn dump_boot_rom_writes_image() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("boot.rom");
    Command::cargo_bin("xtask")
        .unwrap()
        .args(["dump-boot-rom", "-o"])
        .arg(&out)
        .assert()
        .success();
    let bytes = std::fs::read(&out).unwrap();
    assert_eq!(bytes, arduino_uno_rev4::boot_rom_image());
}

#[test]
fn gen_image_rejects_missing_input() {
    Command::cargo_bin("xtask")
        .unwrap()
        .args(["gen-image", "-i", "does/not/exist.elf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}
