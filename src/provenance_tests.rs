//! Unit tests for minisign provenance verification.

use super::*;
use crate::test_utils::TestSigner;
use rstest::rstest;
use std::path::PathBuf;

const CHART: &[u8] = b"chart archive bytes";

struct Signed {
    _temp: tempfile::TempDir,
    archive: PathBuf,
    provenance: PathBuf,
    keyring: PathBuf,
}

/// Write an archive, its provenance from `signer`, and `keyring` text.
fn signed_fixture(signer: &TestSigner, keyring: &str) -> Signed {
    let temp = tempfile::tempdir().expect("temp dir");
    let archive = temp.path().join("mychart-1.2.0.tgz");
    let provenance = temp.path().join("mychart-1.2.0.tgz.prov");
    let keyring_path = temp.path().join("keyring.pub");
    fs::write(&archive, CHART).expect("write archive");
    fs::write(&provenance, signer.sign(CHART)).expect("write provenance");
    fs::write(&keyring_path, keyring).expect("write keyring");
    Signed {
        _temp: temp,
        archive,
        provenance,
        keyring: keyring_path,
    }
}

#[test]
fn verifies_signature_from_trusted_key() {
    let signer = TestSigner::generate();
    let fixture = signed_fixture(&signer, &signer.keyring_entry("release key"));

    let verification = MinisignVerifier
        .verify(&fixture.archive, &fixture.provenance, &fixture.keyring)
        .expect("verify");

    assert_eq!(verification.signer(), Some("release key"));
    assert_eq!(verification.sha256(), sha256_hex(CHART));
}

#[test]
fn finds_trusted_key_among_several() {
    let signer = TestSigner::generate();
    let other = TestSigner::generate();
    let keyring = format!(
        "# chart signing keys\n\n{}{}",
        other.keyring_entry("old key"),
        signer.keyring_entry("current key")
    );
    let fixture = signed_fixture(&signer, &keyring);

    let verification = MinisignVerifier
        .verify(&fixture.archive, &fixture.provenance, &fixture.keyring)
        .expect("verify");

    assert_eq!(verification.signer(), Some("current key"));
}

#[test]
fn rejects_signature_from_untrusted_key() {
    let signer = TestSigner::generate();
    let other = TestSigner::generate();
    let fixture = signed_fixture(&signer, &other.keyring_entry("someone else"));

    let err = MinisignVerifier
        .verify(&fixture.archive, &fixture.provenance, &fixture.keyring)
        .expect_err("expected mismatch");

    assert!(
        matches!(err, VerifyError::SignatureMismatch { keys: 1, .. }),
        "unexpected error: {err}"
    );
}

#[test]
fn rejects_tampered_archive() {
    let signer = TestSigner::generate();
    let fixture = signed_fixture(&signer, &signer.keyring_entry("release key"));
    fs::write(&fixture.archive, b"tampered bytes").expect("tamper archive");

    let err = MinisignVerifier
        .verify(&fixture.archive, &fixture.provenance, &fixture.keyring)
        .expect_err("expected mismatch");

    assert!(matches!(err, VerifyError::SignatureMismatch { .. }));
}

#[test]
fn rejects_malformed_provenance() {
    let signer = TestSigner::generate();
    let fixture = signed_fixture(&signer, &signer.keyring_entry("release key"));
    fs::write(&fixture.provenance, "not a signature").expect("corrupt provenance");

    let err = MinisignVerifier
        .verify(&fixture.archive, &fixture.provenance, &fixture.keyring)
        .expect_err("expected invalid signature");

    assert!(matches!(err, VerifyError::InvalidSignature { .. }));
}

#[rstest]
#[case::empty("")]
#[case::comments_only("# nothing here\n\n")]
#[case::garbage("untrusted comment: broken\nnot-base64!!\n")]
fn keyring_without_keys_is_rejected(#[case] keyring: &str) {
    let signer = TestSigner::generate();
    let fixture = signed_fixture(&signer, keyring);

    let err = MinisignVerifier
        .verify(&fixture.archive, &fixture.provenance, &fixture.keyring)
        .expect_err("expected no trusted keys");

    assert!(matches!(err, VerifyError::NoTrustedKeys { .. }));
}

#[test]
fn missing_keyring_is_reported_with_path() {
    let signer = TestSigner::generate();
    let fixture = signed_fixture(&signer, "");
    let missing = fixture.keyring.with_file_name("absent.pub");

    let err = MinisignVerifier
        .verify(&fixture.archive, &fixture.provenance, &missing)
        .expect_err("expected unreadable keyring");

    assert!(
        matches!(err, VerifyError::KeyringUnreadable { ref path, .. } if path.ends_with("absent.pub"))
    );
}

#[test]
fn unlabelled_keys_are_numbered() {
    let first = TestSigner::generate();
    let second = TestSigner::generate();
    let text = format!(
        "{}\n{}\n",
        first.public_key_base64(),
        second.public_key_base64()
    );

    let labels: Vec<String> = parse_keyring(&text)
        .into_iter()
        .map(|key| key.label)
        .collect();
    assert_eq!(labels, vec!["key 1", "key 2"]);
}

#[test]
fn file_sha256_matches_in_memory_digest() {
    let temp = tempfile::tempdir().expect("temp dir");
    let path = temp.path().join("data.bin");
    let data = vec![7_u8; 20_000];
    fs::write(&path, &data).expect("write data");

    assert_eq!(file_sha256(&path).expect("hash file"), sha256_hex(&data));
}

#[test]
fn sha256_hex_of_empty_input() {
    assert_eq!(
        sha256_hex(b""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}
