// chemistry module
pub mod chemistry {
    pub mod constants;
}

// data module
pub mod data {
    pub mod cluster;
    pub mod feature;
    pub mod spectrum;
    pub mod umc;
}

// algorithm module
pub mod algorithm {
    pub mod distance;
    pub mod linkage;
    pub mod partition;
    pub mod pipeline;
    pub mod refine;
    pub mod tolerance;
    pub mod tree;
    pub mod xic;
}

pub mod error;
pub mod progress;
