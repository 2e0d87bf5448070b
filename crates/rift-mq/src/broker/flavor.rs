//! Broker flavours.
//!
//! The three supported JMS-style brokers report the destination of a delivered
//! message differently. The match engine normalizes all of these forms.

use crate::stub::Destination;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokerFlavor {
    /// `queue://ORDERS`, `topic://EVENTS`
    #[default]
    #[serde(alias = "active_mq")]
    ActiveMq,
    /// `queue:///QM1/ORDERS` (queue manager qualified)
    #[serde(alias = "ibm_mq")]
    IbmMq,
    /// Bare destination names
    Tibco,
}

impl BrokerFlavor {
    /// Render the destination the way this broker reports it on delivered messages
    pub fn render_address(&self, destination: &Destination, queue_manager: &str) -> String {
        match self {
            BrokerFlavor::ActiveMq => destination.to_string(),
            BrokerFlavor::IbmMq => format!(
                "{}:///{}/{}",
                destination.kind.as_str(),
                queue_manager,
                destination.name
            ),
            BrokerFlavor::Tibco => destination.name.clone(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BrokerFlavor::ActiveMq => "activemq",
            BrokerFlavor::IbmMq => "ibmmq",
            BrokerFlavor::Tibco => "tibco",
        }
    }
}

impl fmt::Display for BrokerFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrokerFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "activemq" => Ok(BrokerFlavor::ActiveMq),
            "ibmmq" => Ok(BrokerFlavor::IbmMq),
            "tibco" | "tibcoems" => Ok(BrokerFlavor::Tibco),
            other => Err(format!("Unknown broker flavor: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_address() {
        let dest = Destination::queue("ORDERS");
        assert_eq!(
            BrokerFlavor::ActiveMq.render_address(&dest, "QM1"),
            "queue://ORDERS"
        );
        assert_eq!(
            BrokerFlavor::IbmMq.render_address(&dest, "QM1"),
            "queue:///QM1/ORDERS"
        );
        assert_eq!(BrokerFlavor::Tibco.render_address(&dest, "QM1"), "ORDERS");
    }

    #[test]
    fn test_parse_flavor() {
        assert_eq!("ActiveMQ".parse::<BrokerFlavor>(), Ok(BrokerFlavor::ActiveMq));
        assert_eq!("ibm-mq".parse::<BrokerFlavor>(), Ok(BrokerFlavor::IbmMq));
        assert_eq!("tibco".parse::<BrokerFlavor>(), Ok(BrokerFlavor::Tibco));
        assert!("kafka".parse::<BrokerFlavor>().is_err());
    }
}
