pub mod attendance {
    pub mod domain {
        pub mod attendance_client;
        pub mod attendance_record;
    }
    pub mod infrastructure;
}

pub mod capture {
    pub mod domain {
        pub mod frame_source;
    }
    pub mod infrastructure;
}

pub mod scoring {
    pub mod domain {
        pub mod scorer;
    }
    pub mod infrastructure;
}

pub mod session {
    pub mod check_in_use_case;
    pub mod session_logger;
    pub mod verification_session;
}

pub mod shared {
    pub mod api_error;
    pub mod constants;
    pub mod frame;
    pub mod observation;
}

pub mod verification {
    pub mod domain {
        pub mod detection_loop;
        pub mod detection_state;
        pub mod stability_tracker;
        pub mod verification_policy;
    }
}

#[cfg(test)]
pub(crate) mod test_support;
