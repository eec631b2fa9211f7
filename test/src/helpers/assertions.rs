/// Assert that the observer's copy of the object matches the authority's
#[macro_export]
macro_rules! assert_converged {
    ($link:expr) => {
        assert!(
            $link.is_converged(),
            "observer diverged from authority at frame {}:\n authority: {:?}\n observer: {:?}",
            $link.frame(),
            $link.server_data,
            $link.client_data
        );
    };
}
