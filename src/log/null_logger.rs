/*!

Without the `logging` feature no logger is installed. The configuration is still tracked so the
public API behaves the same, and the `log` facade's level is kept in sync.

*/

use crate::log::LogConfiguration;

impl LogConfiguration {
    pub(in crate::log) fn set_config(&mut self) {
        log::set_max_level(self.global_log_level);
    }
}
