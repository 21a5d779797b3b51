use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, IntCounterVec};

/// Count a classified request
pub fn classified(tracked: bool) {
    lazy_static! {
        static ref CLASSIFIED_COUNT: IntCounterVec = register_int_counter_vec!(
            "classified_requests_total",
            "Number of classified requests",
            &["result"]
        )
        .unwrap();
    }

    let result = if tracked { "tracked" } else { "clean" };
    CLASSIFIED_COUNT.with_label_values(&[result]).inc();
}

/// Count a blocklist refresh attempt
pub fn refresh(ok: bool) {
    lazy_static! {
        static ref REFRESH_COUNT: IntCounterVec = register_int_counter_vec!(
            "blocklist_refresh_total",
            "Number of blocklist refresh attempts",
            &["result"]
        )
        .unwrap();
    }

    let result = if ok { "ok" } else { "error" };
    REFRESH_COUNT.with_label_values(&[result]).inc();
}

/// Count an applied proxy configuration change
pub fn proxy_switch(action: &str) {
    lazy_static! {
        static ref PROXY_SWITCH_COUNT: IntCounterVec = register_int_counter_vec!(
            "proxy_switch_total",
            "Number of proxy configuration changes",
            &["action"]
        )
        .unwrap();
    }

    PROXY_SWITCH_COUNT.with_label_values(&[action]).inc();
}
