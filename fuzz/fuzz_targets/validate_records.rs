#![no_main]

use libfuzzer_sys::fuzz_target;
use load_profile::core::aggregator::LoadProfile;
use load_profile::core::appliance::ApplianceRecord;
use load_profile::core::intervals::IntervalConfig;
use load_profile::core::tiers::{default_tiers, summarise_tiers};
use load_profile::core::validator::validate;

fuzz_target!(|records: Vec<ApplianceRecord>| {
    let validated = validate(&records);
    assert_eq!(validate(&validated), validated);
    for record in &validated {
        assert!(record.apparent_power_va() >= record.power_watts);
    }

    let intervals = IntervalConfig::default();
    if let Ok(profile) = LoadProfile::calculate(&validated, &intervals) {
        for summary in summarise_tiers(&profile, &default_tiers()) {
            assert!(summary.load_allocation_pct >= 0.);
        }
    }
});
