//! Static message-type routing
//!
//! Built once from the configuration and shared read-only by every runner.

use crate::config::PipelineConfig;
use crate::errors::{PipelineError, Result, Stage};

/// `msg_type -> processor` and `msg_type -> strategy` lookup tables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingTable {
    to_processor: Box<[usize]>,
    to_strategy: Box<[usize]>,
}

impl RoutingTable {
    /// Build the tables, rejecting rules that name an unknown type or a
    /// destination that does not exist. Later rules override earlier ones.
    pub fn build(config: &PipelineConfig) -> Result<Self> {
        let types = config.message_types;
        let mut to_processor = vec![0usize; types];
        let mut to_strategy = vec![0usize; types];

        for rule in &config.stage1_rules {
            let destination = rule.destination().ok_or_else(|| {
                PipelineError::InvalidConfig(format!(
                    "stage1 rule for msg_type {} names no processor",
                    rule.msg_type
                ))
            })?;
            check_rule(Stage::One, rule.msg_type, destination, types, config.processors.count)?;
            to_processor[rule.msg_type] = destination;
        }

        for rule in &config.stage2_rules {
            check_rule(
                Stage::Two,
                rule.msg_type,
                rule.destination_strategy,
                types,
                config.strategies.count,
            )?;
            to_strategy[rule.msg_type] = rule.destination_strategy;
        }

        Ok(Self {
            to_processor: to_processor.into_boxed_slice(),
            to_strategy: to_strategy.into_boxed_slice(),
        })
    }

    /// Processor for `msg_type`; types outside the table go to processor 0
    #[inline]
    pub fn processor_for(&self, msg_type: u8) -> usize {
        self.to_processor.get(msg_type as usize).copied().unwrap_or(0)
    }

    /// Strategy for `msg_type`; types outside the table go to strategy 0
    #[inline]
    pub fn strategy_for(&self, msg_type: u8) -> usize {
        self.to_strategy.get(msg_type as usize).copied().unwrap_or(0)
    }
}

fn check_rule(stage: Stage, msg_type: usize, destination: usize, types: usize, available: usize) -> Result<()> {
    if msg_type >= types {
        return Err(PipelineError::MessageTypeOutOfRange {
            stage,
            msg_type,
            types,
        });
    }
    if destination >= available {
        return Err(PipelineError::RouteOutOfRange {
            stage,
            msg_type,
            destination,
            available,
        });
    }
    Ok(())
}
