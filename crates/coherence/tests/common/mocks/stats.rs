use cohsim_core::stats::{Counter, StatsSink};
use mockall::mock;

mock! {
    pub Sink {}
    impl StatsSink for Sink {
        fn increment(&mut self, counter: Counter);
    }
}
