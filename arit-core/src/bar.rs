/// Height of the filling bar `elapsed` seconds into a trial.
///
/// The bar rises linearly so that it would reach `bar_height` at
/// `trial_length`, and freezes once `elapsed` reaches `stop_delay`. Go trials
/// pass the trial length as `stop_delay`, so the bar never freezes early.
/// Units of the result follow `bar_height`.
pub fn bar_height(elapsed: f64, stop_delay: f64, bar_height: f64, trial_length: f64) -> f64 {
    if elapsed < stop_delay {
        elapsed * bar_height / trial_length
    } else {
        stop_delay * bar_height / trial_length
    }
}
