// Copyright (c) 2017 Mike Kershaw and/or applicable contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Handlers for the subsystem commands the server registers over the
//! sync. Each consumes a request payload and produces the ack
//! payload.

use server::HelperState;

pub trait Handler {
    /// The command name the server registers this handler under.
    const NAME: &'static str;

    fn run(payload: &[u8], state: &mut HelperState) -> Vec<u8>;
}

/// Channel control for capture interfaces. The payload names the
/// interface and channel as `interface:channel`; privileged interface
/// reconfiguration happens on this side of the split.
pub struct ChansetHandler;

impl Handler for ChansetHandler {
    const NAME: &'static str = "CHANSET";

    fn run(payload: &[u8], state: &mut HelperState) -> Vec<u8> {
        let request = String::from_utf8_lossy(payload);
        let mut parts = request.splitn(2, ':');
        let interface = parts.next().unwrap_or("").to_string();
        let channel = parts.next().and_then(|c| c.parse::<u32>().ok());
        match channel {
            Some(channel) if !interface.is_empty() => {
                debug!("Channel set request: {} -> {}", interface, channel);
                state.record_channel(&interface, channel);
                vec![1]
            }
            _ => {
                warn!("Malformed channel set request '{}'", request);
                vec![0]
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use server::HelperState;

    #[test]
    fn chanset_records_the_channel() {
        let mut state = HelperState::new();
        let ack = ChansetHandler::run(b"wlan0:11", &mut state);
        assert_eq!(ack, vec![1]);
        assert_eq!(state.channel_for("wlan0"), Some(11));
    }

    #[test]
    fn malformed_chanset_is_refused() {
        let mut state = HelperState::new();
        assert_eq!(ChansetHandler::run(b"wlan0", &mut state), vec![0]);
        assert_eq!(ChansetHandler::run(b":6", &mut state), vec![0]);
        assert!(state.channel_for("wlan0").is_none());
    }
}
