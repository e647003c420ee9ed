//! Typed prompt templates.
//!
//! Each template is a parameter struct checked at construction, so an
//! empty query or report is caught before anything is sent to a model.

use sleuth_core::error::PromptError;
use sleuth_core::evaluation::{Aspect, AspectEvaluation};

pub const RESEARCH_SYSTEM_PROMPT: &str = "You are a research assistant AI. Your goal is to gather and analyze \
information to answer the user's query comprehensively and accurately. \
You should be thorough, clear, and provide properly sourced information. \
You should be aware of what you know and don't know, and be transparent \
about any uncertainties in your research.";

pub const EVALUATOR_SYSTEM_PROMPT: &str = "You are an evaluator AI responsible for assessing the quality of research reports. \
Your job is to critically analyze research findings and reports, checking for \
completeness, factual accuracy, logical consistency, and potential biases or gaps. \
You should provide a fair and balanced assessment, identifying both strengths and \
weaknesses of the research.";

pub const CODE_SYSTEM_PROMPT: &str = "You are an expert Python programmer who solves tasks by writing and running code.

At each step, write a short 'Thought:' explaining what you will do next, then the \
code to run in a single fenced block:

```py
# your code here
```

Use print() to inspect intermediate values. After each block the printed output \
is returned to you as 'Observation:'. Never write the observation yourself.
Every run starts from a fresh interpreter, so redefine anything you need.
When you know the answer, call final_answer(value) in a code block.";

/// A prompt that can be rendered into user-message text.
pub trait PromptTemplate {
    /// Template name used in validation errors.
    const NAME: &'static str;

    fn render(&self) -> String;
}

fn require(template: &'static str, field: &'static str, value: &str) -> Result<(), PromptError> {
    if value.trim().is_empty() {
        Err(PromptError::MissingField { template, field })
    } else {
        Ok(())
    }
}

/// Opening message of a research run.
#[derive(Debug, Clone)]
pub struct ResearchTask<'a> {
    query: &'a str,
}

impl<'a> ResearchTask<'a> {
    pub fn new(query: &'a str) -> Result<Self, PromptError> {
        require(Self::NAME, "query", query)?;
        Ok(Self { query })
    }
}

impl PromptTemplate for ResearchTask<'_> {
    const NAME: &'static str = "research_task";

    fn render(&self) -> String {
        format!("Research query: {}", self.query)
    }
}

#[derive(Debug, Clone)]
pub struct SubQueryPrompt<'a> {
    query: &'a str,
    max: usize,
}

impl<'a> SubQueryPrompt<'a> {
    pub fn new(query: &'a str, max: usize) -> Result<Self, PromptError> {
        require(Self::NAME, "query", query)?;
        Ok(Self {
            query,
            max: max.max(1),
        })
    }
}

impl PromptTemplate for SubQueryPrompt<'_> {
    const NAME: &'static str = "sub_queries";

    fn render(&self) -> String {
        format!(
            "Based on the research question: '{}', generate up to {} distinct search \
             queries that would be useful for gathering comprehensive information. \
             Format your response as a JSON array of strings, containing only the search queries.",
            self.query, self.max
        )
    }
}

/// Asks the model to judge and summarize one fetched source.
#[derive(Debug, Clone)]
pub struct SourcePrompt<'a> {
    url: &'a str,
    content: &'a str,
}

impl<'a> SourcePrompt<'a> {
    pub fn new(url: &'a str, content: &'a str) -> Result<Self, PromptError> {
        require(Self::NAME, "url", url)?;
        Ok(Self { url, content })
    }
}

impl PromptTemplate for SourcePrompt<'_> {
    const NAME: &'static str = "source";

    fn render(&self) -> String {
        format!(
            "Analyze the following content from {} and extract information relevant \
             to our research. Determine if this source is useful and reliable. If it is, \
             provide a detailed summary of the key points and insights. If it is not, \
             say that it is not useful.\n\nContent: {}",
            self.url, self.content
        )
    }
}

#[derive(Debug, Clone)]
pub struct CompletenessPrompt<'a> {
    findings: &'a str,
}

impl<'a> CompletenessPrompt<'a> {
    pub fn new(findings: &'a str) -> Result<Self, PromptError> {
        require(Self::NAME, "findings", findings)?;
        Ok(Self { findings })
    }
}

impl PromptTemplate for CompletenessPrompt<'_> {
    const NAME: &'static str = "completeness";

    fn render(&self) -> String {
        format!(
            "Based on the research findings so far, determine if we have enough information \
             to answer the original query comprehensively, or if further research is needed. \
             If further research is needed, specify what specific information is still missing.\n\n\
             Research findings:\n{}\n\n\
             Is the research complete? Answer with 'COMPLETE' if yes, or 'INCOMPLETE: [missing info]' if no.",
            self.findings
        )
    }
}

#[derive(Debug, Clone)]
pub struct ReportPrompt<'a> {
    query: &'a str,
    findings: &'a str,
}

impl<'a> ReportPrompt<'a> {
    /// `findings` may be empty: a run that found nothing still gets a report.
    pub fn new(query: &'a str, findings: &'a str) -> Result<Self, PromptError> {
        require(Self::NAME, "query", query)?;
        Ok(Self { query, findings })
    }
}

impl PromptTemplate for ReportPrompt<'_> {
    const NAME: &'static str = "report";

    fn render(&self) -> String {
        let findings = if self.findings.trim().is_empty() {
            "(no useful sources were found)"
        } else {
            self.findings
        };
        format!(
            "Based on our research, create a comprehensive report that answers the original \
             question: '{}'. Organize the information logically, cite sources where \
             appropriate, and provide a balanced and thorough analysis. Be clear about any \
             limitations or uncertainties in the research.\n\n\
             Research findings:\n{}",
            self.query, findings
        )
    }
}

/// Opening message of a code run.
#[derive(Debug, Clone)]
pub struct CodeTaskPrompt<'a> {
    task: &'a str,
}

impl<'a> CodeTaskPrompt<'a> {
    pub fn new(task: &'a str) -> Result<Self, PromptError> {
        require(Self::NAME, "task", task)?;
        Ok(Self { task })
    }
}

impl PromptTemplate for CodeTaskPrompt<'_> {
    const NAME: &'static str = "code_task";

    fn render(&self) -> String {
        format!("Task: {}", self.task)
    }
}

/// Sandbox output fed back to the code model.
#[derive(Debug, Clone)]
pub struct ObservationPrompt<'a> {
    observation: &'a str,
}

impl<'a> ObservationPrompt<'a> {
    pub fn new(observation: &'a str) -> Self {
        Self { observation }
    }
}

impl PromptTemplate for ObservationPrompt<'_> {
    const NAME: &'static str = "observation";

    fn render(&self) -> String {
        if self.observation.trim().is_empty() {
            "Observation: (no output)".to_string()
        } else {
            format!("Observation: {}", self.observation)
        }
    }
}

/// One evaluation aspect.
#[derive(Debug, Clone)]
pub struct AspectPrompt<'a> {
    aspect: Aspect,
    query: &'a str,
    report: &'a str,
    findings: &'a str,
}

impl<'a> AspectPrompt<'a> {
    pub fn new(
        aspect: Aspect,
        query: &'a str,
        report: &'a str,
        findings: &'a str,
    ) -> Result<Self, PromptError> {
        require(Self::NAME, "query", query)?;
        require(Self::NAME, "report", report)?;
        Ok(Self {
            aspect,
            query,
            report,
            findings,
        })
    }
}

impl PromptTemplate for AspectPrompt<'_> {
    const NAME: &'static str = "aspect";

    fn render(&self) -> String {
        match self.aspect {
            Aspect::Completeness => format!(
                "Evaluate the completeness of the following research report in addressing \
                 the original query: '{}'. Identify any significant gaps or missing \
                 information that would be important for a comprehensive answer.\n\n\
                 Research report:\n{}\n\n\
                 Score the completeness on a scale of 1-10, where 10 is perfectly complete. \
                 Provide a detailed explanation of your rating.",
                self.query, self.report
            ),
            Aspect::FactualAccuracy => format!(
                "Evaluate the factual accuracy of the following research report by comparing it \
                 to the original findings. Identify any factual errors, misrepresentations, or \
                 unsupported claims.\n\n\
                 Research findings:\n{}\n\n\
                 Research report:\n{}\n\n\
                 Score the factual accuracy on a scale of 1-10, where 10 is perfectly accurate. \
                 Provide a detailed explanation of your rating.",
                self.findings, self.report
            ),
            Aspect::Neutrality => format!(
                "Evaluate the following research report for potential biases, one-sided \
                 perspectives, or lack of balanced consideration of different viewpoints. \
                 Identify any instances where the report may present a skewed or incomplete \
                 picture of the topic.\n\n\
                 Research report:\n{}\n\n\
                 Score the neutrality on a scale of 1-10, where 10 is perfectly neutral and \
                 balanced. Provide a detailed explanation of your rating.",
                self.report
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregatePrompt<'a> {
    aspects: &'a [AspectEvaluation],
}

impl<'a> AggregatePrompt<'a> {
    pub fn new(aspects: &'a [AspectEvaluation]) -> Result<Self, PromptError> {
        if aspects.is_empty() {
            return Err(PromptError::MissingField {
                template: Self::NAME,
                field: "aspects",
            });
        }
        Ok(Self { aspects })
    }
}

impl PromptTemplate for AggregatePrompt<'_> {
    const NAME: &'static str = "aggregate";

    fn render(&self) -> String {
        let summary = self
            .aspects
            .iter()
            .map(|a| {
                format!(
                    "Aspect: {}\nScore: {}/10\nExplanation: {}",
                    a.aspect.label(),
                    a.score,
                    a.explanation
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        format!(
            "Based on the following detailed evaluations of different aspects of a research \
             report, provide an overall assessment of the report's quality. Consider the \
             relative importance of each aspect and provide a final score and verdict.\n\n\
             Evaluations:\n{summary}\n\n\
             Provide your overall assessment, including:\n\
             1. A final score on a scale of 1-10\n\
             2. A verdict (Excellent, Good, Satisfactory, Needs Improvement, or Inadequate)\n\
             3. A summary of key strengths and weaknesses\n\
             4. Suggestions for improvement"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_is_rejected() {
        let err = ResearchTask::new("   ").unwrap_err();
        assert_eq!(
            err,
            PromptError::MissingField {
                template: "research_task",
                field: "query"
            }
        );
        assert!(SubQueryPrompt::new("", 4).is_err());
        assert!(CodeTaskPrompt::new("").is_err());
    }

    #[test]
    fn research_task_renders_query() {
        let prompt = ResearchTask::new("rust async").unwrap();
        assert_eq!(prompt.render(), "Research query: rust async");
    }

    #[test]
    fn sub_query_prompt_states_maximum() {
        let text = SubQueryPrompt::new("rust async", 3).unwrap().render();
        assert!(text.contains("'rust async'"));
        assert!(text.contains("up to 3 distinct"));
        assert!(text.contains("JSON array"));
    }

    #[test]
    fn completeness_needs_findings() {
        assert!(CompletenessPrompt::new("").is_err());
        let text = CompletenessPrompt::new("Source: a\nSummary: b").unwrap().render();
        assert!(text.contains("'COMPLETE'"));
        assert!(text.contains("INCOMPLETE: [missing info]"));
    }

    #[test]
    fn report_without_findings_still_renders() {
        let text = ReportPrompt::new("q", "").unwrap().render();
        assert!(text.contains("no useful sources"));
    }

    #[test]
    fn aspect_prompts_differ_by_aspect() {
        let render = |a| AspectPrompt::new(a, "q", "the report", "the findings").unwrap().render();
        assert!(render(Aspect::Completeness).contains("completeness"));
        assert!(render(Aspect::FactualAccuracy).contains("the findings"));
        assert!(!render(Aspect::Neutrality).contains("the findings"));
        assert!(AspectPrompt::new(Aspect::Neutrality, "q", "", "").is_err());
    }

    #[test]
    fn aggregate_lists_every_aspect() {
        let aspects: Vec<AspectEvaluation> = Aspect::ALL
            .iter()
            .map(|&aspect| AspectEvaluation {
                aspect,
                score: 7,
                explanation: "fine".into(),
            })
            .collect();
        let text = AggregatePrompt::new(&aspects).unwrap().render();
        assert!(text.contains("Aspect: Factual Accuracy\nScore: 7/10\nExplanation: fine"));
        assert!(text.contains("Needs Improvement"));
        assert!(AggregatePrompt::new(&[]).is_err());
    }

    #[test]
    fn observation_prompt_marks_empty_output() {
        assert_eq!(ObservationPrompt::new("").render(), "Observation: (no output)");
        assert_eq!(ObservationPrompt::new("42").render(), "Observation: 42");
    }
}
