//! Tests for the StealthFlow CLI
//!
//! Tests cover:
//! - Argument parsing
//! - Announcement file handling
//! - Send → file → scan round trip through the encrypted key file

#[cfg(test)]
mod cli_parsing {
    use clap::Parser;

    use crate::{Cli, Commands};

    #[test]
    fn test_claim_arguments() {
        let cli = Cli::try_parse_from([
            "stealthflow",
            "claim",
            "-f",
            "ann.json",
            "--index",
            "2",
            "--to",
            "0xbeef",
        ])
        .unwrap();

        match cli.command {
            Commands::Claim { index, to, amount, .. } => {
                assert_eq!(index, 2);
                assert_eq!(to, "0xbeef");
                assert!(amount.is_none());
            }
            _ => panic!("expected claim"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["stealthflow", "info", "--verbose", "--rpc-url", "http://node"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.rpc_url.as_deref(), Some("http://node"));
    }

    #[test]
    fn test_claim_requires_recipient() {
        assert!(Cli::try_parse_from(["stealthflow", "claim", "-f", "a.json", "-i", "0"]).is_err());
    }

    #[test]
    fn test_keygen_defaults_to_mnemonic() {
        let cli = Cli::try_parse_from(["stealthflow", "keygen"]).unwrap();
        match cli.command {
            Commands::Keygen { no_mnemonic, force, .. } => {
                assert!(!no_mnemonic);
                assert!(!force);
            }
            _ => panic!("expected keygen"),
        }
    }
}

#[cfg(test)]
mod announcement_files {
    use tempfile::tempdir;

    use stealthflow::{generate_stealth_address, scan_announcements, StealthKeys};

    use crate::commands::{load_announcements, save_announcements};
    use crate::secure_storage::{SecureKeyStorage, TEST_KDF};

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        assert!(load_announcements(&dir.path().join("none.json")).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[{\"stealth_x\": \"0x1\"}]").unwrap();
        assert!(load_announcements(&path).is_err());
    }

    #[test]
    fn test_off_curve_announcement_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("off.json");
        std::fs::write(
            &path,
            r#"[{"stealth_x":"0x1","stealth_y":"0x2","ephemeral_x":"0x1","ephemeral_y":"0x2","view_tag":7}]"#,
        )
        .unwrap();
        assert!(load_announcements(&path).is_err());
    }

    #[test]
    fn test_send_then_scan_through_files() {
        let dir = tempdir().unwrap();
        let storage = SecureKeyStorage::new(dir.path().join("keys.enc")).with_kdf(TEST_KDF);
        let ann_path = dir.path().join("announcements.json");

        let recipient = StealthKeys::generate().unwrap();
        storage.save(&recipient, "Recipient123").unwrap();
        let someone_else = StealthKeys::generate().unwrap();

        // Sender only sees the published meta-address text
        let meta: stealthflow::MetaAddress =
            recipient.meta_address().to_string().parse().unwrap();

        let mut published = Vec::new();
        for target in [&meta, &someone_else.meta_address(), &meta] {
            published.push(
                generate_stealth_address(&target.view_pubkey, &target.spend_pubkey)
                    .unwrap()
                    .into_announcement(),
            );
        }
        save_announcements(&ann_path, &published).unwrap();

        let restored_keys = storage.load("Recipient123").unwrap();
        let loaded = load_announcements(&ann_path).unwrap();
        assert_eq!(loaded, published);

        let report = scan_announcements(&restored_keys, &loaded).unwrap();
        let indices: Vec<usize> = report.payments.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 2]);
    }
}
