use std::fs;

use anselus_cli::encryption::AlgoString;
use anselus_cli::errors::ClientError;
use anselus_cli::keycard::{hash_data, ChainedKeys, Entry, EntryType, Keycard};
use tempfile::tempdir;

const ORG_SIGNING_KEY: &str = "ED25519:msvXw(nII<Qm6oBHc+92xwRI3>VFF-RcZ=7DEu3|";
const ORG_VERIFY_KEY: &str = "ED25519:)8id(gE02^S<{3H>9B;X4{DuYcb`%wo^mC&1lN88";
const USER_SIGNING_KEY: &str = "ED25519:p;XXU0XF#UO^}vKbC-wS(#5W6=OEIFmR2z`rS1j+";
const USER_VERIFY_KEY: &str = "ED25519:6|HBWrxMY6-?r&Sm)_^PLPerpqOj#b&x#N_#C3}p";
const CR_SIGNING_KEY: &str = "ED25519:ip52{ps^jH)t$k-9bc_RzkegpIW?}FFe~BX&<V}9";
const CR_VERIFY_KEY: &str = "ED25519:d0-oQb;{QxwnO{=!|^62+E=UYk2Y3mr2?XKScF4D";

fn key(value: &str) -> AlgoString {
    AlgoString::parse(value).expect("algostring")
}

fn user_fields(entry: &mut Entry) {
    entry
        .set_fields([
            ("Name", "Corbin Simons"),
            ("Workspace-ID", "4418bf6c-000b-4bb3-8111-316e72030468"),
            ("User-ID", "csimons"),
            ("Domain", "example.com"),
            ("Contact-Request-Verification-Key", CR_VERIFY_KEY),
            (
                "Contact-Request-Encryption-Key",
                "CURVE25519:yBZ0{1fE9{2<b~#i^R+JT-yh-y5M(Wyw_)}_SZOn",
            ),
            (
                "Public-Encryption-Key",
                "CURVE25519:_`UC|vltn_%P5}~vwV^)oY){#uvQSSy(dOD_l(yE",
            ),
            ("Expires", "20201002"),
        ])
        .expect("set fields");
}

fn make_user_entry() -> Entry {
    let mut entry = Entry::new(EntryType::User);
    user_fields(&mut entry);
    entry
        .sign(&key(ORG_SIGNING_KEY), "Organization")
        .expect("org sign");
    entry.generate_hash("SHA-256").expect("hash");
    entry.sign(&key(USER_SIGNING_KEY), "User").expect("user sign");
    entry
}

fn make_org_entry() -> Entry {
    let mut entry = Entry::new(EntryType::Organization);
    entry
        .set_fields([
            ("Name", "Acme Widgets, Inc."),
            ("Contact-Admin", "c590b44c-798d-4055-8d72-725a7942f3f6/acme.com"),
            ("Language", "en"),
            ("Primary-Verification-Key", ORG_VERIFY_KEY),
            (
                "Encryption-Key",
                "CURVE25519:@b?cjpeY;<&y+LSOA&yUQ&ZIrp(JGt{W$*V>ATLG",
            ),
        ])
        .expect("set fields");
    entry
        .sign(&key(ORG_SIGNING_KEY), "Organization")
        .expect("org sign");
    entry.generate_hash("BLAKE3-256").expect("hash");
    entry
}

#[test]
fn new_entries_carry_type_defaults() {
    let user = Entry::new(EntryType::User);
    assert_eq!(user.field("Index"), Some("1"));
    assert_eq!(user.field("Time-To-Live"), Some("7"));
    assert_eq!(user.field("Expires").map(str::len), Some(8));

    let org = Entry::new(EntryType::Organization);
    assert_eq!(org.field("Time-To-Live"), Some("30"));
}

#[test]
fn expiration_is_capped_at_three_years() {
    let mut entry = Entry::new(EntryType::Organization);
    entry.set_expiration(Some(5000));
    let capped = entry.field("Expires").expect("expires").to_string();
    entry.set_expiration(Some(1095));
    assert_eq!(entry.field("Expires"), Some(capped.as_str()));
}

#[test]
fn bytestring_orders_fields_and_signatures() {
    let mut entry = Entry::new(EntryType::User);
    user_fields(&mut entry);
    entry
        .set_fields([
            ("Custody-Signature", "0000000000"),
            ("Organization-Signature", "2222222222"),
            ("User-Signature", "1111111111"),
            ("Unlisted-Field", "ignored"),
        ])
        .expect("signatures");

    let text = String::from_utf8(entry.to_bytes()).expect("utf8");
    let lines: Vec<&str> = text.split("\r\n").collect();
    assert_eq!(lines[0], "Type:User");
    assert_eq!(lines[1], "Index:1");
    assert_eq!(lines[2], "Name:Corbin Simons");
    assert!(text.ends_with("Custody-Signature:0000000000\r\nOrganization-Signature:2222222222\r\nUser-Signature:1111111111\r\n"));
    assert!(!text.contains("Unlisted-Field"));

    let level_one = String::from_utf8(entry.make_bytestring(1)).expect("utf8");
    assert!(level_one.ends_with("Expires:20201002\r\nCustody-Signature:0000000000\r\n"));
    let level_zero = String::from_utf8(entry.make_bytestring(0)).expect("utf8");
    assert!(level_zero.ends_with("Expires:20201002\r\n"));
}

#[test]
fn signatures_and_hash_match_known_values() {
    let entry = make_user_entry();

    assert_eq!(
        entry.get_signature("Organization").expect("org sig").to_string(),
        "ED25519:-0TncJ%bkz(s`9jAnWX-ud%XiFst>c>V=VfSy-FC0_jKN?!Ohg9t$c;2_993)k6InUG(N2`+rX(Gi-na"
    );
    assert_eq!(entry.hash(), "SHA-256:l!|3dT)6GOTc8v{de?LRjgDf32C@x1506ALl?TRw");
    assert_eq!(
        entry.get_signature("User").expect("user sig").to_string(),
        "ED25519:p&-lBFocVY4THPIeyV-1`Q<+PeP^m@qqA3B=$zYz@}YdJ&iRfuOjAjM8dry}zd{j2H`r;Ar^~3eS<XTX"
    );

    entry
        .verify_signature(&key(ORG_VERIFY_KEY), "Organization")
        .expect("org verify");
    entry
        .verify_signature(&key(USER_VERIFY_KEY), "User")
        .expect("user verify");
    entry.is_compliant().expect("compliant");
}

#[test]
fn other_hash_algorithms_match_known_values() {
    let mut entry = make_user_entry();

    entry.generate_hash("SHA3-256").expect("sha3");
    assert_eq!(entry.hash(), "SHA3-256:(t^5wUwLTs5Z^Lo_mU1ceuQ|S3$d5=_G~(;mNF2C");

    entry.generate_hash("BLAKE2").expect("blake2");
    assert_eq!(
        entry.hash(),
        "BLAKE2:spx-FFPs^NUN_@)W;@sZT11N;$M`J9^|mX+gX$y3Pt*17VP}&->m2hhGLr}9eeCj;)^Ap+sa-R!XemDP"
    );

    entry.generate_hash("BLAKE3-256").expect("blake3");
    let data = AlgoString::parse(entry.hash()).expect("hash string");
    assert_eq!(data.raw_data().expect("digest").len(), 256);

    assert!(matches!(
        entry.generate_hash("MD5"),
        Err(ClientError::UnsupportedHashType(_))
    ));
}

#[test]
fn blake3_digest_matches_known_value() {
    let data = [
        "Type:Test",
        "Name:Corbin Simons",
        "Workspace-ID:4418bf6c-000b-4bb3-8111-316e72030468",
        "Domain:example.com",
        "Contact-Request-Verification-Key:ED25519:d0-oQb;{QxwnO{=!|^62+E=UYk2Y3mr2?XKScF4D",
        "Contact-Request-Encryption-Key:CURVE25519:yBZ0{1fE9{2<b~#i^R+JT-yh-y5M(Wyw_)}_SZOn",
        "Public-Encryption-Key:CURVE25519:_`UC|vltn_%P5}~vwV^)oY){#uvQSSy(dOD_l(yE",
        "Expires:20201002",
        concat!(
            "Organization-Signature:ED25519:>>6(c|MBt?66%ywF=2yw4k}%;-8J)218?T=4XtV**m9S4Wzo@%",
            "E0Xme7@op7Vky?>VnCb?h(%WGO9(g!"
        ),
        "Previous-Hash:1234567890",
        "",
    ]
    .join("\r\n");

    let expected = concat!(
        r"BLAKE3-256:d0;tNM(8Q1dRN|}7`g8dH#fxYK(WHKiFX`bcHLkUG3+BMFmNht6Qg9yQ*;VAE!QdCgM%D>bTXG$8",
        r"qm`7!z2_Y;R=ox&{Z57ryXRf<Br+Dw$^D^@4+I$mpHhTu6>o2-xd$s<dT71)v`QDj6J1s?MbLQmN}&HHxVWHsOj",
        r"NC;x1W<_gmHQDJk-!(%{MdC(!j0=<P+(HtavCqQ{LiQRNK*Op9n^U~HntVN>#BeKrgt<O6Ui+f`d$_~eUW*E}&w",
        r"YcW#ERZ(E}geS}XngGZ!-L!uvmRuLE|8ds{0L9r1<x$Y3UJsQQDHo{}L2Ji~VfebS_Uv?p"
    );
    let digest = hash_data("BLAKE3-256", data.as_bytes()).expect("blake3");
    assert_eq!(digest.to_string(), expected);
}

#[test]
fn wrong_key_fails_verification() {
    let entry = make_user_entry();
    assert!(matches!(
        entry.verify_signature(&key(USER_VERIFY_KEY), "Organization"),
        Err(ClientError::InvalidKeycard(_))
    ));
    assert!(matches!(
        entry.verify_signature(&key(ORG_VERIFY_KEY), "Custody"),
        Err(ClientError::NotCompliant(_))
    ));
    assert!(matches!(
        entry.verify_signature(&key(ORG_VERIFY_KEY), "Hashes"),
        Err(ClientError::BadParameterValue(_))
    ));
}

#[test]
fn editing_clears_signatures() {
    let mut entry = make_user_entry();
    entry.set_field("Name", "Corbin S.");
    assert!(entry.hash().is_empty());
    assert!(matches!(
        entry.is_compliant(),
        Err(ClientError::SignatureMissing(_))
    ));
}

#[test]
fn resigning_clears_later_slots() {
    let mut entry = make_user_entry();
    entry
        .sign(&key(ORG_SIGNING_KEY), "Organization")
        .expect("org sign");
    assert!(entry.hash().is_empty());
    assert!(matches!(
        entry.get_signature("User"),
        Err(ClientError::ResourceNotFound(_))
    ));
}

#[test]
fn compliance_reports_missing_fields() {
    let mut entry = Entry::new(EntryType::Organization);
    entry.set_field("Name", "Acme");
    assert!(matches!(
        entry.is_compliant(),
        Err(ClientError::RequiredFieldMissing(field)) if field == "Contact-Admin"
    ));

    make_org_entry().is_compliant().expect("org compliant");
}

#[test]
fn set_parses_entry_text() {
    let source = make_user_entry();
    let mut copy = Entry::new(EntryType::User);
    copy.set(&source.to_bytes()).expect("set");
    assert_eq!(copy.to_bytes(), source.to_bytes());

    let mut org = Entry::new(EntryType::Organization);
    assert!(matches!(
        org.set(&source.to_bytes()),
        Err(ClientError::BadData(_))
    ));

    let mut bad = Entry::new(EntryType::User);
    assert!(bad.set(b"Bogus-Signature:abc\r\n").is_err());
    assert!(bad.set(b"no separator here\r\n").is_err());
}

#[test]
fn signing_rejects_bad_keys() {
    let mut entry = Entry::new(EntryType::User);
    assert!(matches!(
        entry.sign(&AlgoString::new("CURVE25519", "abc"), "User"),
        Err(ClientError::UnsupportedEncryptionType(_))
    ));
    assert!(matches!(
        entry.sign(&key(USER_SIGNING_KEY), "Entry"),
        Err(ClientError::BadParameterValue(_))
    ));
}

#[test]
fn org_chain_rotates_keys_and_verifies() {
    let root = make_org_entry();
    let result = root
        .chain(&key(ORG_SIGNING_KEY), true)
        .expect("chain");
    let mut next = result.entry;

    assert_eq!(next.field("Index"), Some("2"));
    assert_eq!(next.prev_hash(), root.hash());
    assert_eq!(next.field("Secondary-Verification-Key"), Some(ORG_VERIFY_KEY));

    let ChainedKeys::Organization { signing, encryption } = result.keys else {
        panic!("expected organization keys");
    };
    assert_eq!(
        next.field("Primary-Verification-Key"),
        Some(signing.verify_key().to_string().as_str())
    );
    assert_eq!(
        next.field("Encryption-Key"),
        Some(encryption.public_key().to_string().as_str())
    );

    next.sign(&signing.signing_key(), "Organization")
        .expect("org sign");
    next.generate_hash("BLAKE3-256").expect("hash");
    next.is_compliant().expect("compliant");
    next.verify_chain(&root).expect("chain verifies");

    let unrotated = root.chain(&key(ORG_SIGNING_KEY), false).expect("chain");
    assert_eq!(unrotated.entry.field("Secondary-Verification-Key"), None);
}

#[test]
fn user_chain_rotates_contact_request_keys() {
    let root = make_user_entry();
    let result = root.chain(&key(CR_SIGNING_KEY), false).expect("chain");
    let mut next = result.entry;

    let ChainedKeys::User {
        contact_request_signing,
        public_encryption,
        ..
    } = result.keys
    else {
        panic!("expected user keys");
    };
    assert!(public_encryption.is_none());
    assert_eq!(
        next.field("Public-Encryption-Key"),
        root.field("Public-Encryption-Key")
    );
    assert_ne!(
        next.field("Contact-Request-Verification-Key"),
        root.field("Contact-Request-Verification-Key")
    );

    next.sign(&key(ORG_SIGNING_KEY), "Organization")
        .expect("org sign");
    next.generate_hash("BLAKE3-256").expect("hash");
    next.sign(&contact_request_signing.signing_key(), "User")
        .expect("user sign");
    next.is_compliant().expect("compliant");
    next.verify_chain(&root).expect("chain verifies");
}

#[test]
fn chain_requires_compliant_entry() {
    let entry = Entry::new(EntryType::User);
    assert!(entry.chain(&key(CR_SIGNING_KEY), false).is_err());
    assert!(matches!(
        make_user_entry().chain(&AlgoString::new("CURVE25519", "abc"), false),
        Err(ClientError::BadParameterValue(_))
    ));
}

#[test]
fn verify_chain_rejects_wrong_custody_key() {
    let root = make_user_entry();
    let next = root.chain(&key(USER_SIGNING_KEY), false).expect("chain").entry;
    assert!(matches!(
        next.verify_chain(&root),
        Err(ClientError::InvalidKeycard(_))
    ));
    assert!(matches!(
        root.verify_chain(&root),
        Err(ClientError::ResourceNotFound(_))
    ));
}

#[test]
fn keycard_save_load_and_verify() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("acme.keycard");

    let mut card = Keycard::new(EntryType::Organization);
    card.push(make_org_entry()).expect("root");
    let chained = card.chain(&key(ORG_SIGNING_KEY), true).expect("chain");
    chained.entry.is_compliant().expect("chained entry complete");
    card.verify().expect("verify");

    card.save(&path, false).expect("save");
    assert!(matches!(
        card.save(&path, false),
        Err(ClientError::ResourceExists(_))
    ));
    card.save(&path, true).expect("clobber");

    let raw = fs::read(&path).expect("read");
    assert!(raw.starts_with(b"----- BEGIN ENTRY -----\r\nType:Organization\r\n"));

    let loaded = Keycard::load(&path).expect("load");
    assert_eq!(loaded.entry_type(), EntryType::Organization);
    assert_eq!(loaded.entries().len(), 2);
    assert_eq!(loaded.entries()[1].to_bytes(), card.entries()[1].to_bytes());
    loaded.verify().expect("loaded verify");
}

#[test]
fn keycard_chain_and_load_errors() {
    let mut empty = Keycard::new(EntryType::User);
    assert!(matches!(
        empty.chain(&key(CR_SIGNING_KEY), false),
        Err(ClientError::ResourceNotFound(_))
    ));
    assert!(matches!(empty.verify(), Err(ClientError::ResourceNotFound(_))));
    assert!(empty.push(make_org_entry()).is_err());

    let dir = tempdir().expect("tempdir");
    let mixed = dir.path().join("mixed.keycard");
    fs::write(
        &mixed,
        "----- BEGIN ENTRY -----\r\nType:User\r\nIndex:1\r\n----- END ENTRY -----\r\n\
         ----- BEGIN ENTRY -----\r\nType:Organization\r\nIndex:2\r\n----- END ENTRY -----\r\n",
    )
    .expect("write");
    assert!(matches!(Keycard::load(&mixed), Err(ClientError::BadData(_))));
    assert!(matches!(
        Keycard::load(&dir.path().join("missing.keycard")),
        Err(ClientError::ResourceNotFound(_))
    ));
}
