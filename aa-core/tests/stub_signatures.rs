use aakit_aa_types::EntryPointVersion;
use aakit_aa_core::{
    SmartAccount,
    accounts::{
        EtherspotAccount, Kernel7702Account, KernelV2Account, KernelV3Account, KernelVersion,
        LightAccount, LightVersion, NexusAccount, SafeAccount, SafeConfig, Simple7702Account,
        SimpleAccount, ThirdwebAccount, TrustAccount,
    },
};
use aakit_core::owner::{AccountOwner, KeyOwner};
use alloy::primitives::B256;

fn key_owner() -> AccountOwner {
    KeyOwner::random().into()
}

fn every_key_account() -> Vec<Box<dyn SmartAccount>> {
    let chain_id = 84532;
    let mut accounts: Vec<Box<dyn SmartAccount>> = vec![
        Box::new(KernelV2Account::new(key_owner(), chain_id).unwrap()),
        Box::new(KernelV3Account::new(key_owner(), chain_id, KernelVersion::V3_0).unwrap()),
        Box::new(KernelV3Account::new(key_owner(), chain_id, KernelVersion::V3_1).unwrap()),
        Box::new(Kernel7702Account::new(key_owner(), chain_id).unwrap()),
        Box::new(NexusAccount::new(key_owner(), chain_id).unwrap()),
        Box::new(LightAccount::new(key_owner(), chain_id, LightVersion::V1_1).unwrap()),
        Box::new(LightAccount::new(key_owner(), chain_id, LightVersion::V2).unwrap()),
        Box::new(SimpleAccount::new(key_owner(), chain_id, EntryPointVersion::V0_6).unwrap()),
        Box::new(SimpleAccount::new(key_owner(), chain_id, EntryPointVersion::V0_7).unwrap()),
        Box::new(Simple7702Account::new(key_owner(), chain_id).unwrap()),
        Box::new(ThirdwebAccount::new(key_owner(), chain_id, EntryPointVersion::V0_6).unwrap()),
        Box::new(ThirdwebAccount::new(key_owner(), chain_id, EntryPointVersion::V0_7).unwrap()),
        Box::new(TrustAccount::new(key_owner(), chain_id).unwrap()),
        Box::new(EtherspotAccount::new(key_owner(), chain_id).unwrap()),
    ];

    let owners: Vec<AccountOwner> = (0..3).map(|_| key_owner()).collect();
    for threshold in 1..=3 {
        for entrypoint in [EntryPointVersion::V0_6, EntryPointVersion::V0_7] {
            let config = SafeConfig::new(owners.clone(), threshold).with_entrypoint(entrypoint);
            accounts.push(Box::new(SafeAccount::new(config, chain_id).unwrap()));
        }
    }
    accounts
}

#[test]
fn stub_signatures_match_real_signature_length() {
    for account in every_key_account() {
        assert!(account.has_fixed_signature_length(), "{}", account.kind());

        for _ in 0..4 {
            let digest = B256::from(rand::random::<[u8; 32]>());
            let signature = account.sign_and_encode(digest).unwrap();
            assert_eq!(
                signature.len(),
                account.stub_signature().len(),
                "{} signature length drifted from its stub",
                account.kind()
            );
        }
    }
}

#[test]
fn safe_stub_grows_with_threshold() {
    let owners: Vec<AccountOwner> = (0..3).map(|_| key_owner()).collect();
    let lengths: Vec<usize> = (1..=3)
        .map(|threshold| {
            SafeAccount::new(SafeConfig::new(owners.clone(), threshold), 1)
                .unwrap()
                .stub_signature()
                .len()
        })
        .collect();

    // validAfter and validUntil, then 65 bytes per owner
    assert_eq!(lengths, vec![12 + 65, 12 + 130, 12 + 195]);
}
