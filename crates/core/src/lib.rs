//! Live face age/gender estimation: detection, crop extraction, batched
//! prediction, sliding-window smoothing and overlay rendering, driven by a
//! single-threaded capture loop.

pub mod detection {
    pub mod domain {
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod estimation {
    pub mod domain {
        pub mod age_gender_predictor;
        pub mod face_extractor;
        pub mod prediction_smoother;
    }
    pub mod infrastructure;
}

pub mod video {
    pub mod domain {
        pub mod frame_display;
        pub mod frame_source;
    }
    pub mod infrastructure;
}

pub mod rendering {
    pub mod overlay;
}

pub mod pipeline {
    pub mod frame_orchestrator;
    pub mod loop_config;
    pub mod pipeline_logger;
}

pub mod shared {
    pub mod constants;
    pub mod error;
    pub mod frame;
    pub mod geometry;
    pub mod model_resolver;
}
