//! Prompt templates for the map and reduce stages.
//!
//! Map prompts pin the model to the supplied text and ask for citations by
//! file name. Reduce prompts ask it to keep and re-list every file name seen in
//! the answers being merged, so citations survive each reduction level.

use docdigest_shared::Segment;

/// Characters shown from each end of a long prompt in debug logs.
const PREVIEW_CHARS: usize = 200;

/// Prompt for a batch of complete documents.
pub fn document_batch_prompt(documents: &[&Segment], question: &str) -> String {
    let mut prompt = String::from(
        "Below is the extracted text from one or more complete documents, each between \
         <document> ... </document> tags and preceded by its source. \
         Please use only the text below as context to answer the following question. \
         Do not access external files or databases.\n\n",
    );

    for (i, doc) in documents.iter().enumerate() {
        prompt.push_str(&format!(
            "Document Source: {}\nDocument Path: {}\n(Document {} of {} in this batch)\n\n\
             Document Content:\n<document>\n{}\n</document>\n\n",
            doc.document_name,
            doc.source_path.display(),
            i + 1,
            documents.len(),
            doc.text,
        ));
    }

    prompt.push_str(&question_block("Question", question));
    prompt.push_str(
        "Answer the question and include citations referencing the document source \
         (i.e., file name) for every fact you use.",
    );
    prompt
}

/// Prompt for one segment of a multi-chunk document.
pub fn segment_prompt(segment: &Segment, question: &str) -> String {
    format!(
        "Below is the extracted text from a document chunk between the <chunk> ... </chunk> tags. \
         Please use only the text below as context to answer the following question. \
         Do not access external files or databases.\n\n\
         Document Source: {name}\n\
         (Chunk {local} of {local_total} of this document; global chunk {global} of {global_total})\n\n\
         Document Content:\n<chunk>\n{text}\n</chunk>\n\n\
         {question}\
         Answer the question and include citations referencing the document source (i.e., file name).",
        name = segment.document_name,
        local = segment.local_index,
        local_total = segment.local_total,
        global = segment.global_index,
        global_total = segment.global_total,
        text = segment.text,
        question = question_block("Question", question),
    )
}

/// Prompt merging one reduction batch into a single partial answer.
pub fn intermediate_prompt(partial: &str, question: &str) -> String {
    format!(
        "Below are some partial answers produced by processing document chunks between the \
         <partial_content> ... </partial_content> tags. \
         Based solely on the text provided in these partial answers, please consolidate them \
         into a single answer. Do not access external data. \
         Be sure to keep and list all source file names mentioned in the content.\n\n\
         <partial_content>\n{partial}\n</partial_content>\n\n\
         {question}\
         Provide a consolidated answer including citations referencing the document sources \
         (file names).",
        question = question_block("Intermediate question", question),
    )
}

/// Prompt producing the final answer from answers that fit the budget.
pub fn final_prompt(combined: &str, question: &str) -> String {
    format!(
        "Below are the answers produced by processing document chunks between the \
         <combined_content> ... </combined_content> tags. \
         Based solely on the text provided in these answers, please consolidate them into a \
         single final answer. Do not access external data. \
         Be sure to keep and list all source file names mentioned in the content.\n\n\
         <combined_content>\n{combined}\n</combined_content>\n\n\
         {question}\
         Provide a consolidated final answer including citations referencing the document \
         sources (file names).",
        question = question_block("Final question", question),
    )
}

fn question_block(label: &str, question: &str) -> String {
    format!(
        "{label} between <question> ... </question> tags: \n<question>\n{question}\n</question>\n\n"
    )
}

/// Short form of a prompt for debug logs: whole if short, else head and tail.
pub fn prompt_preview(prompt: &str) -> String {
    let chars = prompt.chars().count();
    if chars <= PREVIEW_CHARS * 2 {
        return prompt.to_string();
    }
    let head: String = prompt.chars().take(PREVIEW_CHARS).collect();
    let tail: String = prompt.chars().skip(chars - PREVIEW_CHARS).collect();
    format!("{head} ... {tail}")
}
