use predicates::prelude::*;

mod common;

#[test]
fn test_plan_generic_fs() {
    let mut ctx = common::diskforge();
    let action = ctx.image_action("debian", "1GB", "ext4", "debian");

    ctx.cmd
        .arg("plan")
        .arg(&action)
        .assert()
        .success()
        .stdout(predicate::str::contains("1000000000 bytes"))
        .stdout(predicate::str::contains("mkfs.ext4 -L debian <device>"))
        .stdout(predicate::str::contains("mount type: ext4"));
}

#[test]
fn test_plan_hfsx_mounts_as_hfsplus() {
    let mut ctx = common::diskforge();
    let action = ctx.image_action("mac", "10MB", "hfsx", "mac");

    ctx.cmd
        .arg("plan")
        .arg(&action)
        .assert()
        .success()
        .stdout(predicate::str::contains("mkfs.hfsplus -s -v mac <device>"))
        .stdout(predicate::str::contains("mount type: hfsplus"));
}

#[test]
fn test_plan_none_runs_nothing() {
    let mut ctx = common::diskforge();
    let action = ctx.image_action("raw", "1MB", "none", "raw");

    ctx.cmd
        .arg("plan")
        .arg(&action)
        .assert()
        .success()
        .stdout(predicate::str::contains("mkfs:       (none)"));
}

#[test]
fn test_plan_json() {
    let mut ctx = common::diskforge();
    let action = ctx.image_action("efi", "512MiB", "vfat", "EFI");

    let output = ctx
        .cmd
        .args(["plan", "--format", "json"])
        .arg(&action)
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["size_bytes"], 512_000_000);
    assert_eq!(plan["filesystem"], "vfat");
    assert_eq!(plan["mount_type"], "vfat");
    assert_eq!(
        plan["mkfs"],
        serde_json::json!(["mkfs.vfat", "-F32", "-n", "EFI", "<device>"])
    );
}

#[test]
fn test_plan_recipe_list() {
    let mut ctx = common::diskforge();
    let action = ctx.write_action(
        "recipe.yaml",
        "- action: image-file\n  imagename: disk.img\n  imagesize: 2GB\n  fs: btrfs\n  fsname: root\n",
    );

    ctx.cmd
        .arg("plan")
        .arg(&action)
        .assert()
        .success()
        .stdout(predicate::str::contains("mkfs.btrfs -L root -f <device>"));
}

#[test]
fn test_plan_missing_field() {
    let mut ctx = common::diskforge();
    let action = ctx.write_action("bad.yaml", "imagename: a.img\nimagesize: 1GB\nfs: vfat\n");

    ctx.cmd
        .arg("plan")
        .arg(&action)
        .assert()
        .failure()
        .stderr(predicate::str::contains("fsname"));
}

#[test]
fn test_plan_rejects_path_like_fs() {
    let mut ctx = common::diskforge();
    let action = ctx.image_action("evil", "1MB", "../../bin/sh", "x");

    ctx.cmd.arg("plan").arg(&action).assert().failure();
}

#[test]
fn test_plan_bad_size() {
    let mut ctx = common::diskforge();
    let action = ctx.image_action("big", "huge", "ext4", "x");

    ctx.cmd
        .arg("plan")
        .arg(&action)
        .assert()
        .failure()
        .stderr(predicate::str::contains("huge"));
}
